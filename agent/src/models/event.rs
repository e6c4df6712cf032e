//! Domain events emitted by the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::application::ENV_LIVE;
use crate::utils::{generate_compact_uuid, generate_uuid};

/// Entry in an application's execution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEvent {
    pub application: String,
    pub environment: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionLogEvent {
    /// A `DEPLOY` entry for the live environment
    pub fn deploy(application: &str, message: String) -> Self {
        Self {
            application: application.to_string(),
            environment: ENV_LIVE.to_string(),
            event_type: "DEPLOY".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub application_id: String,
    pub notification_type: String,
}

impl Notification {
    pub fn update(application_id: &str) -> Self {
        Self {
            application_id: application_id.to_string(),
            notification_type: "Update".to_string(),
        }
    }
}

/// Event published to the application's event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub application_id: String,
    pub event_name: String,
    pub environment: String,
    pub correlation_id: String,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// `POST:DEPLOY` with fresh event and correlation ids
    pub fn post_deploy(application_id: &str) -> Self {
        Self {
            event_id: generate_compact_uuid(),
            application_id: application_id.to_string(),
            event_name: "POST:DEPLOY".to_string(),
            environment: ENV_LIVE.to_string(),
            correlation_id: generate_uuid(),
            payload: Value::Object(Default::default()),
        }
    }
}
