//! Filters object-created events and hands matching ones to the guard.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::audit::{AuditEvent, AuditHandle};
use crate::events::ObjectCreatedEvent;
use crate::metrics;

use super::{
    emit, EventConsumer, ExecutionGuard, OrchestrationError, Outcome, PipelineStart, SkipReason,
};

/// Storage event watcher. Mutates nothing itself.
pub struct StorageWatcher {
    input_prefix: String,
    bucket: Option<String>,
    guard: Arc<ExecutionGuard>,
    audit: Option<AuditHandle>,
}

impl StorageWatcher {
    pub fn new(
        input_prefix: impl Into<String>,
        bucket: Option<String>,
        guard: Arc<ExecutionGuard>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            input_prefix: input_prefix.into(),
            bucket,
            guard,
            audit,
        }
    }

    /// Whether the event should reach the guard.
    pub fn filter(&self, event: &ObjectCreatedEvent) -> Result<(), SkipReason> {
        if let Some(ref bucket) = self.bucket {
            if &event.bucket != bucket {
                return Err(SkipReason::OtherBucket);
            }
        }
        if event.object_key.ends_with('/') {
            return Err(SkipReason::FolderPlaceholder);
        }
        if !event.object_key.starts_with(&self.input_prefix) {
            return Err(SkipReason::NonMatchingPrefix);
        }
        Ok(())
    }

    pub async fn handle(
        &self,
        event: &ObjectCreatedEvent,
    ) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        event.validate()?;

        if let Err(reason) = self.filter(event) {
            debug!(
                bucket = %event.bucket,
                object_key = %event.object_key,
                reason = %reason,
                "Ignoring storage event"
            );
            metrics::STORAGE_EVENTS.with_label_values(&["ignored"]).inc();
            emit(
                &self.audit,
                AuditEvent::StorageEventIgnored {
                    bucket: event.bucket.clone(),
                    object_key: event.object_key.clone(),
                    reason: reason.as_str().to_string(),
                },
            )
            .await;
            return Ok(Outcome::Skipped(reason));
        }

        info!(
            bucket = %event.bucket,
            object_key = %event.object_key,
            pipeline_id = %self.guard.pipeline_id(),
            "New input data, checking pipeline"
        );
        metrics::STORAGE_EVENTS.with_label_values(&["dispatched"]).inc();
        self.guard.ensure_running().await
    }
}

#[async_trait]
impl EventConsumer<ObjectCreatedEvent> for StorageWatcher {
    type Output = PipelineStart;

    async fn consume(
        &self,
        event: ObjectCreatedEvent,
    ) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        self.handle(&event).await
    }
}
