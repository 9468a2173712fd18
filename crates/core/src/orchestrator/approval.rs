//! Approval gate: announces a deployment awaiting production promotion.
//!
//! The gate only notifies. The human decision is recorded by the pipeline
//! runner; nothing here waits or polls for it.

use std::sync::Arc;

use tracing::{error, info};

use crate::audit::{AuditEvent, AuditHandle};
use crate::backend::{DeploymentHandle, Notifier};
use crate::job::JobRecord;
use crate::metrics;

use super::{emit, ApprovalResult};

pub struct ApprovalGate {
    notifier: Arc<dyn Notifier>,
    topic: String,
    subject: String,
    audit: Option<AuditHandle>,
}

impl ApprovalGate {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        topic: impl Into<String>,
        subject: impl Into<String>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            notifier,
            topic: topic.into(),
            subject: subject.into(),
            audit,
        }
    }

    /// Notification body for a deployed job.
    pub fn message(record: &JobRecord, handle: &DeploymentHandle) -> String {
        format!(
            "Training job {} (commit {}) has been deployed to endpoint {} using model {}. \
             Review the endpoint and approve promotion to production in the pipeline runner.",
            record.job_name,
            record.source_commit,
            handle.endpoint_name,
            record.model_artifact_uri.as_deref().unwrap_or("unknown"),
        )
    }

    /// Publish the approval request. Failures are reported, not raised.
    pub async fn request(&self, record: &JobRecord, handle: &DeploymentHandle) -> ApprovalResult {
        let message = Self::message(record, handle);

        match self
            .notifier
            .publish(&self.topic, &self.subject, &message)
            .await
        {
            Ok(message_id) => {
                info!(
                    job_name = %record.job_name,
                    topic = %self.topic,
                    message_id = %message_id,
                    "Production approval requested"
                );
                metrics::APPROVAL_NOTIFICATIONS
                    .with_label_values(&["sent"])
                    .inc();
                emit(
                    &self.audit,
                    AuditEvent::ApprovalRequested {
                        job_name: record.job_name.clone(),
                        topic: self.topic.clone(),
                        message_id: message_id.clone(),
                    },
                )
                .await;
                ApprovalResult {
                    approval_requested: true,
                    message_id: Some(message_id),
                }
            }
            Err(e) => {
                error!(
                    job_name = %record.job_name,
                    topic = %self.topic,
                    "Approval notification failed: {}",
                    e
                );
                metrics::APPROVAL_NOTIFICATIONS
                    .with_label_values(&["failed"])
                    .inc();
                emit(
                    &self.audit,
                    AuditEvent::ApprovalNotificationFailed {
                        job_name: record.job_name.clone(),
                        topic: self.topic.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                ApprovalResult {
                    approval_requested: false,
                    message_id: None,
                }
            }
        }
    }
}
