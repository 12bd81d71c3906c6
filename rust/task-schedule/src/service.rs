//! Schedule operations wired to a store, a task catalog and the daemon.
//!
//! [`ScheduleService`] runs the lifecycle hooks in the order a host document
//! layer would and persists the result, so the CLI and tests can exercise a
//! whole save, delete or operator action in one call.

use std::sync::Arc;

use tracing::{info, warn};

use crate::daemon::SchedulerClient;
use crate::describe::CronDescriber;
use crate::error::{Result, ScheduleError};
use crate::lifecycle::{self, SaveOutcome};
use crate::model::ScheduleDefinition;
use crate::status::{ExecutionStatusReader, JobStatusReport, JobStore};
use crate::store::{ScheduleStore, TaskCatalog};
use crate::translate::TranslationContext;

/// Result of a successful save.
#[derive(Debug)]
pub struct SaveReport {
    /// The record as persisted.
    pub schedule: ScheduleDefinition,
    pub outcome: SaveOutcome,
}

impl SaveReport {
    /// Daemon failure to show the operator; the save itself went through.
    pub fn warning(&self) -> Option<&ScheduleError> {
        self.outcome.warning()
    }
}

/// Save, delete and operator actions over a [`ScheduleStore`].
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    catalog: Arc<dyn TaskCatalog>,
    describer: Arc<dyn CronDescriber>,
    client: SchedulerClient,
    context: Option<TranslationContext>,
}

impl std::fmt::Debug for ScheduleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleService")
            .field("client", &self.client)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ScheduleService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        catalog: Arc<dyn TaskCatalog>,
        describer: Arc<dyn CronDescriber>,
        client: SchedulerClient,
    ) -> Self {
        Self {
            store,
            catalog,
            describer,
            client,
            context: None,
        }
    }

    /// Translate with a fixed offset and year instead of the system clock.
    #[must_use]
    pub fn with_translation_context(mut self, context: TranslationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn client(&self) -> &SchedulerClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    fn translation_context(&self) -> TranslationContext {
        self.context.unwrap_or_else(TranslationContext::current)
    }

    /// Fetch a stored schedule or fail with `UnknownSchedule`.
    pub async fn get(&self, id: &str) -> Result<ScheduleDefinition> {
        self.store
            .get(id)
            .await
            .map_err(|e| ScheduleError::store(&e))?
            .ok_or_else(|| ScheduleError::UnknownSchedule { id: id.to_string() })
    }

    /// Validate, reconcile with the daemon, and persist.
    ///
    /// Validation errors, including a task missing from the catalog, abort
    /// before the daemon is contacted or anything is written. Daemon failures
    /// are reported through [`SaveReport::warning`].
    #[tracing::instrument(skip_all, fields(schedule_id = %schedule.id))]
    pub async fn save(&self, mut schedule: ScheduleDefinition) -> Result<SaveReport> {
        let previous = self
            .store
            .get(&schedule.id)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        let task_description = self
            .catalog
            .short_description(&schedule.task)
            .await
            .map_err(|e| ScheduleError::store(&e))?
            .ok_or_else(|| {
                ScheduleError::Validation(format!("Task {} does not exist", schedule.task))
            })?;

        lifecycle::before_validate(&mut schedule, self.describer.as_ref(), Some(task_description));
        lifecycle::validate(&mut schedule, &self.translation_context())?;
        lifecycle::refresh_description(&mut schedule, self.describer.as_ref());

        let outcome = lifecycle::before_save(&mut schedule, previous.as_ref(), &self.client).await?;

        self.store
            .put(&schedule)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        info!(
            schedule_id = %schedule.id,
            cron = schedule.cron_string.as_deref().unwrap_or_default(),
            enabled = schedule.enabled,
            "Task schedule saved"
        );

        Ok(SaveReport { schedule, outcome })
    }

    /// Cancel on the daemon, then remove the record.
    ///
    /// Returns the daemon's reply to the cancellation, if it gave one.
    pub async fn delete(&self, id: &str) -> Result<Option<String>> {
        let mut schedule = self.get(id).await?;
        let reply = lifecycle::on_delete(&mut schedule, &self.client).await;
        self.store
            .remove(id)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        info!(schedule_id = %id, "Task schedule deleted");
        Ok(reply)
    }

    /// Flip `enabled` and save, which submits or cancels as needed.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<SaveReport> {
        let mut schedule = self.get(id).await?;
        schedule.enabled = enabled;
        self.save(schedule).await
    }

    /// Operator action: ask the daemon to reload one enabled schedule.
    ///
    /// The schedule is re-translated first. The new handle (or its absence
    /// after a failure) is persisted either way.
    pub async fn resubmit_one(&self, id: &str) -> Result<String> {
        let mut schedule = self.get(id).await?;
        if !schedule.enabled {
            return Err(ScheduleError::InvalidArgument(format!(
                "Task Schedule {id} is disabled; enable it before resubmitting"
            )));
        }
        lifecycle::check_id(&schedule.id)?;
        lifecycle::validate(&mut schedule, &self.translation_context())?;

        let result = lifecycle::resubmit(&mut schedule, &self.client).await;
        self.store
            .put(&schedule)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        result
    }

    /// Operator action: ask the daemon to drop one schedule.
    ///
    /// Follows the disable transition: the record is persisted with
    /// `enabled = false` and no handle, whatever the daemon replies.
    pub async fn cancel_one(&self, id: &str) -> Result<String> {
        let mut schedule = self.get(id).await?;
        schedule.enabled = false;
        let result = lifecycle::cancel(&mut schedule, &self.client).await;
        self.store
            .put(&schedule)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        result
    }

    /// Operator action: report on the last run of a schedule's job.
    pub async fn last_execution_status<S: JobStore>(
        &self,
        id: &str,
        reader: &ExecutionStatusReader<S>,
    ) -> Result<JobStatusReport> {
        let schedule = self.get(id).await?;
        reader.read_status(&schedule.remote_job_handle).await
    }

    /// Re-translate and resubmit a stored schedule, persisting the new handle.
    pub(crate) async fn revalidate_and_resubmit(&self, schedule: &mut ScheduleDefinition) -> Result<String> {
        lifecycle::check_id(&schedule.id)?;
        lifecycle::validate(schedule, &self.translation_context())?;
        lifecycle::refresh_description(schedule, self.describer.as_ref());
        let reply = lifecycle::resubmit(schedule, &self.client).await?;
        self.store
            .put(schedule)
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        Ok(reply)
    }

    /// Turn a schedule off after a failure, without re-validating it.
    ///
    /// A schedule that no longer translates must still be disableable, so
    /// this writes the record directly instead of going through [`Self::save`].
    pub(crate) async fn disable_after_failure(&self, schedule: &mut ScheduleDefinition) -> Result<()> {
        schedule.enabled = false;
        // Cancel failures are already logged.
        let _ = lifecycle::cancel(schedule, &self.client).await;
        warn!(schedule_id = %schedule.id, "Task schedule disabled after failure");
        self.store
            .put(schedule)
            .await
            .map_err(|e| ScheduleError::store(&e))
    }
}
