//! Persistence hooks and the submit / resubmit / cancel state machine.
//!
//! A host calls these in order around its own write: [`before_validate`],
//! [`validate`], [`before_save`], then persists the record. Deletion calls
//! [`on_delete`] before the record is removed.
//!
//! The remote job handle follows the daemon: it is set to the schedule id
//! after a successful submission and cleared whenever a submission fails or a
//! cancellation is attempted, whatever the daemon answered.

use tracing::{info, warn};

use crate::daemon::SchedulerClient;
use crate::describe::CronDescriber;
use crate::error::{Result, ScheduleError};
use crate::model::ScheduleDefinition;
use crate::translate::{TranslationContext, translate_with};

/// Reserved in schedule ids.
pub const RESERVED_ID_CHAR: char = '|';

/// What [`before_save`] did on the daemon side.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The schedule was (re)submitted; the daemon's reply is kept for display.
    Submitted { reply: String },
    /// Submission failed. The record is still saved, enabled and without a
    /// handle, and the error should be shown to the operator as a warning.
    SubmitFailed { error: ScheduleError },
    /// The schedule was just disabled and a cancellation was sent.
    Cancelled { reply: Option<String> },
    /// Nothing to tell the daemon.
    NoRemoteChange,
}

impl SaveOutcome {
    /// Error to surface as a warning without blocking the save.
    pub fn warning(&self) -> Option<&ScheduleError> {
        match self {
            Self::SubmitFailed { error } => Some(error),
            _ => None,
        }
    }
}

/// Reject ids the daemon cannot carry.
pub fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ScheduleError::Validation(
            "Task Schedules must have a non-empty id".into(),
        ));
    }
    if id.contains(RESERVED_ID_CHAR) {
        return Err(ScheduleError::Validation(format!(
            "Task Schedules cannot have the pipe character (|) in their id '{id}'"
        )));
    }
    Ok(())
}

/// Clear fields the frequency does not use and fill in the derived descriptions.
pub fn before_validate(
    schedule: &mut ScheduleDefinition,
    describer: &dyn CronDescriber,
    task_description: Option<String>,
) {
    schedule.clear_inactive_fields();
    schedule.task_description = task_description;
    refresh_description(schedule, describer);
}

/// Re-render the schedule description from the current cron string.
pub fn refresh_description(schedule: &mut ScheduleDefinition, describer: &dyn CronDescriber) {
    schedule.schedule_description = schedule
        .cron_string
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| describer.describe(c));
}

/// Translate the structured fields and store the result as the cron string.
#[tracing::instrument(skip_all, fields(schedule_id = %schedule.id, frequency = %schedule.run_frequency))]
pub fn validate(schedule: &mut ScheduleDefinition, ctx: &TranslationContext) -> Result<()> {
    schedule.clear_inactive_fields();
    let expr = translate_with(schedule, ctx)?;
    schedule.cron_string = Some(expr);
    Ok(())
}

/// Reconcile the daemon with the record about to be written.
///
/// `previous` is the stored version, `None` for a new record. Only a
/// malformed id fails this hook; daemon failures come back as
/// [`SaveOutcome::SubmitFailed`] so the save can proceed.
#[tracing::instrument(skip_all, fields(schedule_id = %schedule.id, enabled = schedule.enabled))]
pub async fn before_save(
    schedule: &mut ScheduleDefinition,
    previous: Option<&ScheduleDefinition>,
    client: &SchedulerClient,
) -> Result<SaveOutcome> {
    check_id(&schedule.id)?;

    if schedule.enabled {
        return Ok(match resubmit(schedule, client).await {
            Ok(reply) => SaveOutcome::Submitted { reply },
            Err(error) => SaveOutcome::SubmitFailed { error },
        });
    }

    if previous.is_some_and(|p| p.enabled) {
        let reply = cancel(schedule, client).await.ok();
        return Ok(SaveOutcome::Cancelled { reply });
    }

    schedule.remote_job_handle.clear();
    Ok(SaveOutcome::NoRemoteChange)
}

/// Cancel on the daemon before the record is removed, whatever its state.
pub async fn on_delete(schedule: &mut ScheduleDefinition, client: &SchedulerClient) -> Option<String> {
    cancel(schedule, client).await.ok()
}

/// Ask the daemon to reload this schedule and record the resulting handle.
pub async fn resubmit(schedule: &mut ScheduleDefinition, client: &SchedulerClient) -> Result<String> {
    match client.submit(&schedule.id).await {
        Ok(reply) => {
            schedule.remote_job_handle = schedule.id.clone();
            info!(schedule_id = %schedule.id, reply = %reply, "Task schedule submitted");
            Ok(reply)
        }
        Err(e) => {
            schedule.remote_job_handle.clear();
            warn!(schedule_id = %schedule.id, error = %e, "Task schedule submission failed");
            Err(e)
        }
    }
}

/// Ask the daemon to drop this schedule. The handle is cleared either way.
pub async fn cancel(schedule: &mut ScheduleDefinition, client: &SchedulerClient) -> Result<String> {
    let result = client.cancel(&schedule.id).await;
    schedule.remote_job_handle.clear();

    match &result {
        Ok(reply) => info!(schedule_id = %schedule.id, reply = %reply, "Task schedule cancelled"),
        Err(e) => warn!(schedule_id = %schedule.id, error = %e, "Task schedule cancellation failed"),
    }
    result
}
