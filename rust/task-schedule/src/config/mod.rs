//! Configuration management for the task schedule tools.
//!
//! Settings are layered: built-in defaults, then an optional
//! `config/task-schedule.{yaml,toml,json}` file, then environment variables
//! prefixed `TASK_SCHEDULE_` with `__` between nested keys
//! (`TASK_SCHEDULE_REDIS__URL`). A `.env` file is read first if present.
//!
//! ```rust,ignore
//! use task_schedule::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! ```

pub mod error;

pub use error::{ConfigResult, ConfigurationError};

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler daemon endpoint.
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Queue-backed job records.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Local schedule file used by the CLI.
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from defaults, config files and the environment,
    /// then validate it. Use [`Self::load_unchecked`] to skip validation.
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::load_unchecked()?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;

        Ok(config)
    }

    /// Load configuration without validation.
    pub fn load_unchecked() -> anyhow::Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("daemon.socket_path", default_socket_path())?
            .set_default("redis.url", default_redis_url())?
            .set_default("redis.job_key_prefix", default_job_key_prefix())?
            .set_default("store.path", default_store_path())?
            .set_default("logging.level", default_log_level())?
            .add_source(config::File::with_name("config/task-schedule").required(false))
            .add_source(
                config::Environment::with_prefix("TASK_SCHEDULE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.daemon.socket_path.trim().is_empty() {
            errors.push(ConfigurationError::missing_required(
                "daemon.socket_path",
                "TASK_SCHEDULE_DAEMON__SOCKET_PATH",
            ));
        }
        if self.daemon.max_response_bytes == 0 {
            errors.push(ConfigurationError::invalid(
                "daemon.max_response_bytes must be greater than zero",
                "Set TASK_SCHEDULE_DAEMON__MAX_RESPONSE_BYTES to a positive size, e.g. 4096",
            ));
        }
        if !(self.redis.url.starts_with("redis://") || self.redis.url.starts_with("rediss://")) {
            errors.push(ConfigurationError::invalid(
                format!("redis.url '{}' is not a Redis URL", self.redis.url),
                "Set TASK_SCHEDULE_REDIS__URL to redis://host:port or rediss://host:port",
            ));
        }
        if self.redis.job_key_prefix.is_empty() {
            errors.push(ConfigurationError::missing_required(
                "redis.job_key_prefix",
                "TASK_SCHEDULE_REDIS__JOB_KEY_PREFIX",
            ));
        }

        ConfigurationError::from_list(errors)
    }
}

/// Scheduler daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix-domain socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Largest reply read from the daemon, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_socket_path() -> String {
    "/tmp/btu_scheduler.sock".to_string()
}

fn default_max_response_bytes() -> usize {
    4096
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix of the hash holding a job record; the job handle follows it.
    #[serde(default = "default_job_key_prefix")]
    pub job_key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_job_key_prefix() -> String {
    "rq:job:".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            job_key_prefix: default_job_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding task descriptions and schedules.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "task_schedules.json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 3] = [
        "TASK_SCHEDULE_DAEMON__SOCKET_PATH",
        "TASK_SCHEDULE_DAEMON__MAX_RESPONSE_BYTES",
        "TASK_SCHEDULE_REDIS__URL",
    ];

    fn clear_vars() {
        // SAFETY: test-only environment variables, serialized by #[serial]
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.daemon.socket_path, "/tmp/btu_scheduler.sock");
        assert_eq!(config.daemon.max_response_bytes, 4096);
        assert_eq!(config.redis.job_key_prefix, "rq:job:");
        assert_eq!(config.store.path, "task_schedules.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear_vars();
        let config = AppConfig::load().unwrap();
        assert_eq!(config.daemon.socket_path, "/tmp/btu_scheduler.sock");
        assert_eq!(config.redis.url, "redis://127.0.0.1:6379");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_vars();
        // SAFETY: test-only environment variables, serialized by #[serial]
        unsafe {
            env::set_var("TASK_SCHEDULE_DAEMON__SOCKET_PATH", "/run/btu.sock");
            env::set_var("TASK_SCHEDULE_DAEMON__MAX_RESPONSE_BYTES", "1024");
            env::set_var("TASK_SCHEDULE_REDIS__URL", "rediss://queue:6380");
        }

        let config = AppConfig::load_unchecked().unwrap();
        clear_vars();

        assert_eq!(config.daemon.socket_path, "/run/btu.sock");
        assert_eq!(config.daemon.max_response_bytes, 1024);
        assert_eq!(config.redis.url, "rediss://queue:6380");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_rejects_bad_redis_url() {
        clear_vars();
        // SAFETY: test-only environment variables, serialized by #[serial]
        unsafe {
            env::set_var("TASK_SCHEDULE_REDIS__URL", "http://queue:6379");
        }

        let result = AppConfig::load();
        clear_vars();

        let message = result.unwrap_err().to_string();
        assert!(message.contains("not a Redis URL"), "{message}");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = AppConfig::default();
        config.daemon.socket_path = "  ".into();
        config.daemon.max_response_bytes = 0;
        config.redis.job_key_prefix.clear();

        let err = config.validate().unwrap_err();
        assert_eq!(err.count(), 3);
        assert!(err.to_string().contains("daemon.socket_path"));
    }
}
