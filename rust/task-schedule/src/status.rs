//! Last-execution status of a schedule's queue job.
//!
//! The daemon enqueues each run as a job whose record is a hash keyed by the
//! job handle. Two fields matter here: `status` (text) and `exc_info`
//! (zlib-compressed diagnostic text, present when a run raised).

use std::collections::HashMap;
use std::io::Read;

use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use parking_lot::RwLock;

use crate::error::{Result, ScheduleError};
use crate::logging::OpTimer;

/// Status value the queue writes when a job completed without raising.
pub const FINISHED_STATUS: &str = "finished";

const STATUS_FIELD: &str = "status";
const DIAGNOSTIC_FIELD: &str = "exc_info";

/// Read access to queue job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Raw value of `field` in the hash at `key`, or `None` when absent.
    async fn field(&self, key: &str, field: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Job records held in Redis.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJobStore").finish_non_exhaustive()
    }
}

impl RedisJobStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    #[must_use]
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn field(&self, key: &str, field: &str) -> anyhow::Result<Option<Vec<u8>>> {
        use redis::AsyncCommands;

        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.hget(key, field).await?;
        Ok(value)
    }
}

/// In-memory job records for testing.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    hashes: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&self, key: &str, field: &str, value: impl Into<Vec<u8>>) {
        self.hashes
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn field(&self, key: &str, field: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .hashes
            .read()
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }
}

/// Outcome of the most recent run of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatusReport {
    /// The run completed without raising.
    Finished,
    /// A status is recorded but no diagnostics are attached yet.
    NoDiagnostics { status: String },
    /// The run left diagnostics behind.
    ///
    /// `detail` is the decompressed payload decoded as UTF-8. Invalid byte
    /// sequences are replaced with U+FFFD; valid text passes through unchanged.
    Failed { status: String, detail: String },
}

impl JobStatusReport {
    pub fn status(&self) -> &str {
        match self {
            Self::Finished => FINISHED_STATUS,
            Self::NoDiagnostics { status } | Self::Failed { status, .. } => status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Operator-facing summary for the job identified by `handle`.
    pub fn message(&self, handle: &str) -> String {
        match self {
            Self::Finished => format!("Job {handle} completed successfully."),
            Self::NoDiagnostics { status } => format!(
                "Job status = {status}\nNo results available; job may not have been processed yet."
            ),
            Self::Failed { status, detail } => format!("Job status = {status}\n{detail}"),
        }
    }
}

/// Reads job records through a [`JobStore`].
#[derive(Clone)]
pub struct ExecutionStatusReader<S> {
    store: S,
    key_prefix: String,
}

impl<S> std::fmt::Debug for ExecutionStatusReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStatusReader")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl<S: JobStore> ExecutionStatusReader<S> {
    pub fn new(store: S, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// Report on the last run of the job identified by `handle`.
    #[tracing::instrument(skip(self), fields(job_handle = %handle))]
    pub async fn read_status(&self, handle: &str) -> Result<JobStatusReport> {
        if handle.trim().is_empty() {
            return Err(ScheduleError::InvalidArgument(
                "a job handle is required to read execution status".into(),
            ));
        }

        let key = format!("{}{handle}", self.key_prefix);
        let timer = OpTimer::new("queue", "read_status", handle);
        let result = self.read_record(&key, handle).await;
        timer.finish_with_result(result.as_ref());
        result
    }

    async fn read_record(&self, key: &str, handle: &str) -> Result<JobStatusReport> {
        let status = self
            .store
            .field(key, STATUS_FIELD)
            .await
            .map_err(|e| ScheduleError::queue(&e))?
            .ok_or_else(|| ScheduleError::NotFound {
                handle: handle.to_string(),
            })?;
        let status = String::from_utf8_lossy(&status).into_owned();

        if status == FINISHED_STATUS {
            return Ok(JobStatusReport::Finished);
        }

        let payload = self
            .store
            .field(key, DIAGNOSTIC_FIELD)
            .await
            .map_err(|e| ScheduleError::queue(&e))?;
        match payload.filter(|p| !p.is_empty()) {
            None => Ok(JobStatusReport::NoDiagnostics { status }),
            Some(compressed) => Ok(JobStatusReport::Failed {
                status,
                detail: decompress(&compressed, handle)?,
            }),
        }
    }
}

fn decompress(compressed: &[u8], handle: &str) -> Result<String> {
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| {
            ScheduleError::Queue(format!("diagnostics for job {handle} are not zlib data: {e}"))
        })?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
