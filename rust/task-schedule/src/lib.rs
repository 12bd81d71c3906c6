//! Task Schedule - recurring job definitions kept in sync with a scheduler daemon
//!
//! Operators describe a recurring job with a frequency class and a few
//! structured fields (minute, hour, weekday, day of month, month) or a raw cron
//! expression. This crate turns that definition into one canonical 5-field
//! cron expression and keeps the external scheduler daemon in step with it:
//!
//! - **Translation**: field validation per frequency, UTC hour correction,
//!   calendar-aware day checks
//! - **Lifecycle**: submit on save while enabled, cancel on disable or delete,
//!   daemon failures reported without blocking the save
//! - **Status**: last-run status and decompressed diagnostics from the queue
//! - **Bulk**: resubmission of every enabled schedule with per-item isolation
//!
//! # Architecture
//!
//! - [`cron`]: cron grammar, validation and next-fire computation
//! - [`model`]: the schedule record and its enums
//! - [`translate`]: structured fields to cron expression
//! - [`describe`]: human-readable cron descriptions
//! - [`lifecycle`]: persistence hooks and the submit/cancel state machine
//! - [`daemon`]: scheduler daemon protocol client
//! - [`status`]: queue job status reader
//! - [`store`]: schedule persistence and task catalog
//! - [`service`]: hooks, store and daemon composed into whole operations
//! - [`bulk`]: resubmit-all pass
//! - [`config`]: configuration loading and validation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use task_schedule::{
//!     InMemoryDaemon, InMemoryScheduleStore, InMemoryTaskCatalog, PlainDescriber,
//!     RunFrequency, ScheduleDefinition, ScheduleService, SchedulerClient,
//! };
//!
//! let catalog = InMemoryTaskCatalog::new();
//! catalog.insert("TASK-1", "Send overdue invoice reminders");
//!
//! let service = ScheduleService::new(
//!     Arc::new(InMemoryScheduleStore::new()),
//!     Arc::new(catalog),
//!     Arc::new(PlainDescriber),
//!     SchedulerClient::new(Arc::new(InMemoryDaemon::new())),
//! );
//!
//! let mut schedule = ScheduleDefinition::new("TS000001", "TASK-1", RunFrequency::Daily);
//! schedule.hour = Some(6);
//! schedule.minute = Some(0);
//! schedule.enabled = true;
//! let report = service.save(schedule).await?;
//! println!("{}", report.schedule.cron_string.unwrap_or_default());
//! ```

pub mod bulk;
pub mod config;
pub mod cron;
pub mod daemon;
pub mod describe;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod service;
pub mod status;
pub mod store;
pub mod translate;

pub use bulk::{BulkFailure, BulkReport, BulkResubmitter};
pub use daemon::{DaemonReply, DaemonTransport, InMemoryDaemon, SchedulerClient};
#[cfg(unix)]
pub use daemon::UnixSocketTransport;
pub use describe::{CronDescriber, PlainDescriber};
pub use error::{Result, ScheduleError};
pub use lifecycle::SaveOutcome;
pub use model::{LifecycleState, Month, RunFrequency, ScheduleDefinition, Weekday};
pub use service::{SaveReport, ScheduleService};
pub use status::{ExecutionStatusReader, InMemoryJobStore, JobStatusReport, JobStore, RedisJobStore};
pub use store::{
    InMemoryScheduleStore, InMemoryTaskCatalog, JsonFileScheduleStore, ScheduleStore, TaskCatalog,
};
pub use translate::{TranslationContext, translate, translate_with};
