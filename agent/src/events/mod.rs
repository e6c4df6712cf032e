//! Event publishing

use async_trait::async_trait;
use tracing::info;

use crate::errors::AgentError;
use crate::models::event::{Event, ExecutionLogEvent, Notification};

/// Sink for the pipeline's domain events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn log_execution(&self, event: ExecutionLogEvent) -> Result<(), AgentError>;

    async fn notify(&self, notification: Notification) -> Result<(), AgentError>;

    async fn publish(&self, event: Event) -> Result<(), AgentError>;
}

/// Publishes events as structured log records
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn log_execution(&self, event: ExecutionLogEvent) -> Result<(), AgentError> {
        info!(
            application = %event.application,
            environment = %event.environment,
            event_type = %event.event_type,
            "{}",
            event.message
        );
        Ok(())
    }

    async fn notify(&self, notification: Notification) -> Result<(), AgentError> {
        info!(
            application = %notification.application_id,
            notification_type = %notification.notification_type,
            "notification"
        );
        Ok(())
    }

    async fn publish(&self, event: Event) -> Result<(), AgentError> {
        info!(
            event = %serde_json::to_string(&event)?,
            "published {}",
            event.event_name
        );
        Ok(())
    }
}
