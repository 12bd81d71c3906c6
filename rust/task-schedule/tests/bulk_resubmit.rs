//! Resubmit-all pass over enabled schedules.

mod common;

use common::{Harness, daily, weekly};
use task_schedule::daemon::{DaemonRequest, RequestType};
use task_schedule::{BulkResubmitter, DaemonReply, ScheduleError, Weekday};

#[tokio::test]
async fn test_one_invalid_schedule_is_disabled_and_others_resubmitted() {
    let h = Harness::new();
    for id in ["TS1", "TS2", "TS3"] {
        let mut s = daily(id, 8, 0);
        s.enabled = true;
        h.store_raw(&s).await;
    }
    let mut broken = weekly("TS4", Weekday::Friday, 8, 0);
    broken.day_of_week = None;
    broken.enabled = true;
    broken.remote_job_handle = "TS4".into();
    h.store_raw(&broken).await;

    let report = BulkResubmitter::new(h.service.clone())
        .resubmit_all()
        .await
        .unwrap();

    assert_eq!(report.submitted, vec!["TS1", "TS2", "TS3"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].schedule_id, "TS4");
    assert!(matches!(report.failed[0].error, ScheduleError::Validation(_)));

    for id in ["TS1", "TS2", "TS3"] {
        let stored = h.stored(id).await;
        assert!(stored.enabled, "{id} should stay enabled");
        assert_eq!(stored.remote_job_handle, id);
        assert_eq!(stored.cron_string.as_deref(), Some("0 8 * * *"));
        assert_eq!(h.daemon.requests_for(id), vec![DaemonRequest::submit(id)]);
    }

    let disabled = h.stored("TS4").await;
    assert!(!disabled.enabled);
    assert_eq!(disabled.remote_job_handle, "");
    assert!(
        h.daemon
            .requests_for("TS4")
            .iter()
            .all(|r| r.request_type == RequestType::CancelTaskSchedule)
    );
}

#[tokio::test]
async fn test_daemon_failure_disables_only_that_schedule() {
    let h = Harness::new();
    for id in ["TS1", "TS2"] {
        let mut s = daily(id, 8, 0);
        s.enabled = true;
        h.store_raw(&s).await;
    }
    h.daemon.set_reply("TS1", DaemonReply::Silent);

    let report = BulkResubmitter::new(h.service.clone())
        .resubmit_all()
        .await
        .unwrap();

    assert!(!report.is_clean());
    assert!(report.failed[0].error.is_daemon_failure());
    assert_eq!(report.submitted, vec!["TS2"]);
    assert!(!h.stored("TS1").await.enabled);
    assert!(h.stored("TS2").await.enabled);
}

#[tokio::test]
async fn test_disabled_schedules_are_skipped() {
    let h = Harness::new();
    h.store_raw(&daily("TS1", 8, 0)).await;

    let report = BulkResubmitter::new(h.service.clone())
        .resubmit_all()
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(report.submitted.is_empty());
    assert!(h.daemon.requests().is_empty());
}
