//! Error taxonomy for schedule normalization and daemon dispatch.
//!
//! Every failure this crate can produce is one of these kinds. Hosts render
//! them; nothing here formats user-facing markup.

use thiserror::Error;

/// Errors raised by translation, lifecycle transitions and daemon/queue adapters.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A structured field is missing or out of range, the cron string is
    /// malformed, or the schedule id contains a reserved character.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A translated cron expression failed re-validation.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The scheduler daemon produced no response at all.
    #[error(
        "No response from the task scheduler daemon at {endpoint}; check the daemon logs"
    )]
    DaemonUnreachable { endpoint: String },

    /// The daemon (or the transport in front of it) reported a connection failure.
    #[error("Task scheduler daemon error: {0}")]
    Daemon(String),

    /// No queue record exists for the job handle.
    #[error("No job information is available for job {handle}")]
    NotFound { handle: String },

    /// A precondition on the call arguments was violated.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No schedule with the given id exists in the store.
    #[error("Task schedule not found: {id}")]
    UnknownSchedule { id: String },

    /// The persistence collaborator failed.
    #[error("Schedule store error: {0}")]
    Store(String),

    /// The queue-backed job store failed or returned an undecodable payload.
    #[error("Queue store error: {0}")]
    Queue(String),
}

impl ScheduleError {
    /// Short, stable error code for hosts that map errors to messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::DaemonUnreachable { .. } => "DAEMON_UNREACHABLE",
            Self::Daemon(_) => "DAEMON_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UnknownSchedule { .. } => "UNKNOWN_SCHEDULE",
            Self::Store(_) => "STORE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
        }
    }

    /// Logic defects that must not be swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Whether this error prevents the record from being persisted.
    pub fn blocks_save(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Daemon failures are warnings: the record is still saved and can be retried.
    pub fn is_daemon_failure(&self) -> bool {
        matches!(self, Self::DaemonUnreachable { .. } | Self::Daemon(_))
    }

    pub(crate) fn store(err: &anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }

    pub(crate) fn queue(err: &anyhow::Error) -> Self {
        Self::Queue(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
