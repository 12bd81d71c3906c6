//! Schedule persistence and the task catalog.
//!
//! The store is the host's document layer; this crate only needs keyed reads,
//! upserts, removal and listing. Two backends are provided: an in-memory one
//! for tests and a JSON file used by the CLI.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::ScheduleDefinition;

/// Keyed storage for schedule records.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Fetch a schedule by id.
    async fn get(&self, id: &str) -> anyhow::Result<Option<ScheduleDefinition>>;

    /// Insert or replace a schedule.
    async fn put(&self, schedule: &ScheduleDefinition) -> anyhow::Result<()>;

    /// Remove a schedule. Returns whether it existed.
    async fn remove(&self, id: &str) -> anyhow::Result<bool>;

    /// All schedules, ordered by id.
    async fn list(&self) -> anyhow::Result<Vec<ScheduleDefinition>>;

    /// Enabled schedules only.
    async fn list_enabled(&self) -> anyhow::Result<Vec<ScheduleDefinition>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.enabled)
            .collect())
    }
}

/// Source of task short descriptions.
#[async_trait]
pub trait TaskCatalog: Send + Sync {
    async fn short_description(&self, task: &str) -> anyhow::Result<Option<String>>;
}

/// In-memory schedule store for testing.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    schedules: parking_lot::RwLock<BTreeMap<String, ScheduleDefinition>>,
}

impl InMemoryScheduleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get(&self, id: &str) -> anyhow::Result<Option<ScheduleDefinition>> {
        Ok(self.schedules.read().get(id).cloned())
    }

    async fn put(&self, schedule: &ScheduleDefinition) -> anyhow::Result<()> {
        self.schedules
            .write()
            .insert(schedule.id.clone(), schedule.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.schedules.write().remove(id).is_some())
    }

    async fn list(&self) -> anyhow::Result<Vec<ScheduleDefinition>> {
        Ok(self.schedules.read().values().cloned().collect())
    }
}

/// In-memory task catalog for testing.
#[derive(Debug, Default)]
pub struct InMemoryTaskCatalog {
    descriptions: parking_lot::RwLock<HashMap<String, String>>,
}

impl InMemoryTaskCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: impl Into<String>, description: impl Into<String>) {
        self.descriptions.write().insert(task.into(), description.into());
    }
}

#[async_trait]
impl TaskCatalog for InMemoryTaskCatalog {
    async fn short_description(&self, task: &str) -> anyhow::Result<Option<String>> {
        Ok(self.descriptions.read().get(task).cloned())
    }
}

/// On-disk layout of [`JsonFileScheduleStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    /// Task id to short description.
    #[serde(default)]
    tasks: BTreeMap<String, String>,
    #[serde(default)]
    schedules: Vec<ScheduleDefinition>,
}

/// Schedules and task descriptions in a single JSON file.
///
/// A missing file reads as empty. Writes go to a sibling temporary file which
/// is then renamed over the original.
#[derive(Debug)]
pub struct JsonFileScheduleStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> anyhow::Result<StoreDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreDocument::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse schedule file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read schedule file {}", self.path.display())),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write schedule file {}", self.path.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace schedule file {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for JsonFileScheduleStore {
    async fn get(&self, id: &str) -> anyhow::Result<Option<ScheduleDefinition>> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        Ok(document.schedules.into_iter().find(|s| s.id == id))
    }

    async fn put(&self, schedule: &ScheduleDefinition) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        match document.schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => *existing = schedule.clone(),
            None => document.schedules.push(schedule.clone()),
        }
        self.write_document(&document).await
    }

    async fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let before = document.schedules.len();
        document.schedules.retain(|s| s.id != id);
        if document.schedules.len() == before {
            return Ok(false);
        }
        self.write_document(&document).await?;
        Ok(true)
    }

    async fn list(&self) -> anyhow::Result<Vec<ScheduleDefinition>> {
        let _guard = self.lock.lock().await;
        let mut schedules = self.read_document().await?.schedules;
        schedules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(schedules)
    }
}

#[async_trait]
impl TaskCatalog for JsonFileScheduleStore {
    async fn short_description(&self, task: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.tasks.remove(task))
    }
}
