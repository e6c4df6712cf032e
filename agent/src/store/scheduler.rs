//! Scheduling store

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::models::schedule::{ScheduleEntry, ScheduleSpec};
use crate::utils::generate_uuid;

/// Store of repeating jobs, keyed by application id
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Cancel every schedule tagged with the application. Returns how many
    /// were removed.
    async fn cancel_by_application(&self, application_id: &str) -> Result<usize, AgentError>;

    /// Register a schedule repeating on `spec.repeat_every`
    async fn create_schedule(&self, spec: ScheduleSpec) -> Result<ScheduleEntry, AgentError>;

    async fn list_by_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<ScheduleEntry>, AgentError>;
}

/// Schedule store persisted as a JSON array
pub struct FileScheduleStore {
    file: File,
    lock: Mutex<()>,
}

impl FileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: File::new(path),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<ScheduleEntry>, AgentError> {
        if self.file.exists().await {
            self.file.read_json().await
        } else {
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl ScheduleStore for FileScheduleStore {
    async fn cancel_by_application(&self, application_id: &str) -> Result<usize, AgentError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.spec.data.application != application_id);
        let removed = before - entries.len();
        if removed > 0 {
            self.file.write_json(&entries).await?;
        }
        debug!("Cancelled {} schedules for {}", removed, application_id);
        Ok(removed)
    }

    async fn create_schedule(&self, spec: ScheduleSpec) -> Result<ScheduleEntry, AgentError> {
        if spec.repeat_every.trim().is_empty() {
            return Err(AgentError::ValidationError(
                "schedule needs a repeat interval".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let entry = ScheduleEntry {
            id: generate_uuid(),
            spec,
            created_at: Utc::now(),
        };
        entries.push(entry.clone());
        self.file.write_json(&entries).await?;
        Ok(entry)
    }

    async fn list_by_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<ScheduleEntry>, AgentError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|e| e.spec.data.application == application_id)
            .collect())
    }
}
