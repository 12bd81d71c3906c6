//! Shared fixtures for integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;

use task_schedule::{
    DaemonTransport, InMemoryDaemon, InMemoryScheduleStore, InMemoryTaskCatalog, PlainDescriber,
    RunFrequency, ScheduleDefinition, ScheduleService, ScheduleStore, SchedulerClient,
    TaskCatalog, TranslationContext, Weekday,
};

pub const UTC_2025: TranslationContext = TranslationContext {
    utc_offset_hours: 0,
    year: 2025,
};

pub struct Harness {
    pub daemon: Arc<InMemoryDaemon>,
    pub store: Arc<InMemoryScheduleStore>,
    pub catalog: Arc<InMemoryTaskCatalog>,
    pub service: ScheduleService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_context(UTC_2025)
    }

    pub fn with_context(context: TranslationContext) -> Self {
        let daemon = Arc::new(InMemoryDaemon::new());
        let store = Arc::new(InMemoryScheduleStore::new());
        let catalog = Arc::new(InMemoryTaskCatalog::new());
        catalog.insert("TASK-1", "Send overdue invoice reminders");

        let service = ScheduleService::new(
            Arc::clone(&store) as Arc<dyn ScheduleStore>,
            Arc::clone(&catalog) as Arc<dyn TaskCatalog>,
            Arc::new(PlainDescriber),
            SchedulerClient::new(Arc::clone(&daemon) as Arc<dyn DaemonTransport>),
        )
        .with_translation_context(context);

        Self {
            daemon,
            store,
            catalog,
            service,
        }
    }

    /// Write a record without running any hooks.
    pub async fn store_raw(&self, schedule: &ScheduleDefinition) {
        self.store.put(schedule).await.unwrap();
    }

    pub async fn stored(&self, id: &str) -> ScheduleDefinition {
        self.store
            .get(id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("schedule {id} not stored"))
    }
}

pub fn daily(id: &str, hour: u8, minute: u8) -> ScheduleDefinition {
    let mut s = ScheduleDefinition::new(id, "TASK-1", RunFrequency::Daily);
    s.hour = Some(hour);
    s.minute = Some(minute);
    s
}

pub fn weekly(id: &str, day: Weekday, hour: u8, minute: u8) -> ScheduleDefinition {
    let mut s = ScheduleDefinition::new(id, "TASK-1", RunFrequency::Weekly);
    s.day_of_week = Some(day);
    s.hour = Some(hour);
    s.minute = Some(minute);
    s
}
