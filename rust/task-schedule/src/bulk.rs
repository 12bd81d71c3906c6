//! Resubmission of every enabled schedule.

use tracing::{error, info, warn};

use crate::error::{Result, ScheduleError};
use crate::service::ScheduleService;

/// A schedule the pass could not resubmit. It has been disabled.
#[derive(Debug)]
pub struct BulkFailure {
    pub schedule_id: String,
    pub error: ScheduleError,
}

/// Outcome of one [`BulkResubmitter::resubmit_all`] pass.
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Ids resubmitted successfully, in processing order.
    pub submitted: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives the resubmit path over all enabled schedules.
///
/// Each schedule is handled on its own: a failure disables that schedule and
/// the pass moves on.
#[derive(Debug, Clone)]
pub struct BulkResubmitter {
    service: ScheduleService,
}

impl BulkResubmitter {
    #[must_use]
    pub fn new(service: ScheduleService) -> Self {
        Self { service }
    }

    /// Re-validate and resubmit every enabled schedule.
    ///
    /// Fails only when the enabled set cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn resubmit_all(&self) -> Result<BulkReport> {
        let schedules = self
            .service
            .store()
            .list_enabled()
            .await
            .map_err(|e| ScheduleError::store(&e))?;
        info!(count = schedules.len(), "Resubmitting enabled task schedules");

        let mut report = BulkReport::default();
        for mut schedule in schedules {
            match self.service.revalidate_and_resubmit(&mut schedule).await {
                Ok(_) => report.submitted.push(schedule.id),
                Err(e) => {
                    if e.is_fatal() {
                        error!(schedule_id = %schedule.id, error = %e, "Task schedule failed re-validation");
                    } else {
                        warn!(schedule_id = %schedule.id, error = %e, "Error while submitting task schedule");
                    }
                    if let Err(disable_err) = self.service.disable_after_failure(&mut schedule).await {
                        error!(
                            schedule_id = %schedule.id,
                            error = %disable_err,
                            "Could not disable failing task schedule"
                        );
                    }
                    report.failed.push(BulkFailure {
                        schedule_id: schedule.id,
                        error: e,
                    });
                }
            }
        }

        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            "Bulk resubmission finished"
        );
        Ok(report)
    }
}
