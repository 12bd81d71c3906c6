//! Task Schedule CLI
//!
//! Operator entry point: translate schedule fields, and drive saves,
//! resubmissions, cancellations and status reads against the scheduler daemon
//! for schedules kept in the configured JSON store.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use task_schedule::config::AppConfig;
use task_schedule::cron::CronParser;
use task_schedule::describe::{CronDescriber, PlainDescriber};
use task_schedule::{
    BulkResubmitter, DaemonTransport, ExecutionStatusReader, JsonFileScheduleStore, Month,
    RedisJobStore, RunFrequency, SaveOutcome, SaveReport, ScheduleDefinition, ScheduleService,
    ScheduleStore, SchedulerClient, TaskCatalog, TranslationContext, Weekday, translate_with,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "task-schedule")]
#[command(about = "Task schedule translation and scheduler daemon control")]
#[command(version)]
struct Args {
    /// Log level; overrides logging.level from configuration.
    #[arg(long, env = "RUST_LOG", global = true)]
    log_level: Option<String>,

    /// Schedule store file; overrides store.path.
    #[arg(long, global = true)]
    store: Option<String>,

    /// Scheduler daemon socket; overrides daemon.socket_path.
    #[arg(long, global = true)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cron expression for a set of schedule fields.
    Translate {
        /// Hourly, Daily, Weekly, Monthly, Yearly or "Cron Style".
        #[arg(long)]
        frequency: RunFrequency,
        #[arg(long)]
        minute: Option<u8>,
        /// Local wall-clock hour.
        #[arg(long)]
        hour: Option<u8>,
        #[arg(long)]
        day_of_week: Option<Weekday>,
        #[arg(long)]
        day_of_month: Option<u8>,
        #[arg(long)]
        month: Option<Month>,
        /// Cron expression for "Cron Style".
        #[arg(long)]
        cron: Option<String>,
        /// Local minus UTC in hours; defaults to the system timezone.
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<i32>,
    },
    /// Ask the daemon to reload one enabled schedule.
    Resubmit { id: String },
    /// Ask the daemon to drop one schedule and mark it disabled.
    Cancel { id: String },
    /// Show the outcome of a schedule's last run.
    Status { id: String },
    /// Resubmit every enabled schedule, disabling the ones that fail.
    ResubmitAll,
    /// Cancel a schedule on the daemon and remove it from the store.
    Delete { id: String },
    /// Enable a schedule and submit it.
    Enable { id: String },
    /// Disable a schedule and cancel it on the daemon.
    Disable { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(path) = args.store {
        config.store.path = path;
    }
    if let Some(socket) = args.socket {
        config.daemon.socket_path = socket;
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(log_level, config.logging.json);

    match args.command {
        Command::Translate {
            frequency,
            minute,
            hour,
            day_of_week,
            day_of_month,
            month,
            cron,
            utc_offset,
        } => {
            let mut schedule = ScheduleDefinition::new("cli", "cli", frequency);
            schedule.minute = minute;
            schedule.hour = hour;
            schedule.day_of_week = day_of_week;
            schedule.day_of_month = day_of_month;
            schedule.month = month;
            schedule.cron_string = cron;
            schedule.clear_inactive_fields();

            let mut ctx = TranslationContext::current();
            if let Some(offset) = utc_offset {
                ctx.utc_offset_hours = offset;
            }
            print_translation(&schedule, &ctx)?;
        }
        Command::Resubmit { id } => {
            let reply = build_service(&config)?.resubmit_one(&id).await?;
            println!("Response from scheduler daemon: {reply}");
        }
        Command::Cancel { id } => {
            let reply = build_service(&config)?.cancel_one(&id).await?;
            println!("Request = Cancel Task Schedule.\nResponse from scheduler daemon: {reply}");
        }
        Command::Status { id } => {
            let service = build_service(&config)?;
            let store = RedisJobStore::connect(&config.redis.url)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", config.redis.url))?;
            let reader = ExecutionStatusReader::new(store, config.redis.job_key_prefix.clone());
            let handle = service.get(&id).await?.remote_job_handle;
            let report = service.last_execution_status(&id, &reader).await?;
            println!("{}", report.message(&handle));
        }
        Command::ResubmitAll => {
            let report = BulkResubmitter::new(build_service(&config)?)
                .resubmit_all()
                .await?;
            for id in &report.submitted {
                println!("Resubmitted {id}");
            }
            for failure in &report.failed {
                println!(
                    "Error from scheduler daemon while submitting {}: {} (schedule disabled)",
                    failure.schedule_id, failure.error
                );
            }
        }
        Command::Delete { id } => {
            let reply = build_service(&config)?.delete(&id).await?;
            println!(
                "Deleted {id}. Response from scheduler daemon: {}",
                reply.as_deref().unwrap_or("(none)")
            );
        }
        Command::Enable { id } => {
            print_save(&build_service(&config)?.set_enabled(&id, true).await?);
        }
        Command::Disable { id } => {
            print_save(&build_service(&config)?.set_enabled(&id, false).await?);
        }
    }

    Ok(())
}

fn print_translation(schedule: &ScheduleDefinition, ctx: &TranslationContext) -> anyhow::Result<()> {
    let expr = translate_with(schedule, ctx)?;
    println!("{expr}");
    println!("{}", PlainDescriber.describe(&expr));

    match CronParser::parse(&expr) {
        Ok(parsed) => match parsed.next_after(&chrono::Utc::now()) {
            Some(next) => println!("Next run: {}", next.to_rfc3339()),
            None => println!("Next run: none within five years"),
        },
        Err(e) => println!("Next run: unavailable ({e:#})"),
    }
    Ok(())
}

fn print_save(report: &SaveReport) {
    let schedule = &report.schedule;
    println!(
        "Saved {} ({})",
        schedule.id,
        schedule.cron_string.as_deref().unwrap_or_default()
    );
    match &report.outcome {
        SaveOutcome::Submitted { reply } => println!("Response from scheduler daemon: {reply}"),
        SaveOutcome::SubmitFailed { error } => println!("Warning: {error}"),
        SaveOutcome::Cancelled { reply } => println!(
            "Request = Cancel Task Schedule.\nResponse from scheduler daemon: {}",
            reply.as_deref().unwrap_or("(none)")
        ),
        SaveOutcome::NoRemoteChange => {}
    }
}

fn build_service(config: &AppConfig) -> anyhow::Result<ScheduleService> {
    let store = Arc::new(JsonFileScheduleStore::new(&config.store.path));
    Ok(ScheduleService::new(
        Arc::clone(&store) as Arc<dyn ScheduleStore>,
        store as Arc<dyn TaskCatalog>,
        Arc::new(PlainDescriber),
        SchedulerClient::new(daemon_transport(config)?),
    ))
}

#[cfg(unix)]
fn daemon_transport(config: &AppConfig) -> anyhow::Result<Arc<dyn DaemonTransport>> {
    Ok(Arc::new(task_schedule::UnixSocketTransport::from_config(
        &config.daemon,
    )))
}

#[cfg(not(unix))]
fn daemon_transport(_config: &AppConfig) -> anyhow::Result<Arc<dyn DaemonTransport>> {
    anyhow::bail!("the scheduler daemon is reached over a Unix-domain socket, which this platform lacks")
}

/// Initialize tracing/logging. Logs go to stderr so command output stays clean.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
