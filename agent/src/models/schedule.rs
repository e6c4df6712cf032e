//! Scheduled event models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job name schedules are registered under
pub const CREATE_EVENT_JOB: &str = "create:event";

/// Data attached to a scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleData {
    /// Application id the schedule belongs to
    pub application: String,
    pub environment: String,
    /// Event names raised on every run
    pub events: Vec<String>,
}

/// A schedule to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub name: String,
    pub data: ScheduleData,
    /// Cron expression the job repeats on
    pub repeat_every: String,
}

/// A registered schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    #[serde(flatten)]
    pub spec: ScheduleSpec,
    pub created_at: DateTime<Utc>,
}
