use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Storage watcher
    /// An object-created event did not lead to a guard check.
    StorageEventIgnored {
        bucket: String,
        object_key: String,
        reason: String,
    },

    // Pipeline guard
    PipelineExecutionStarted {
        pipeline_id: String,
        execution_id: String,
        /// Status of the latest execution before the start, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_status: Option<String>,
    },
    PipelineStartSkipped {
        pipeline_id: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latest_execution_id: Option<String>,
    },

    // Training lifecycle
    TrainingJobSubmitted {
        job_name: String,
        execution_id: String,
        source_commit: String,
        image_reference: String,
    },
    TrainingJobRejected {
        job_name: String,
        execution_id: String,
        reason: String,
        /// True when the backend was unavailable rather than refusing the request.
        transient: bool,
    },
    TrainingJobStatusChanged {
        job_name: String,
        from_status: String,
        to_status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // Deployment and approval
    DeploymentRequested {
        job_name: String,
        endpoint_name: String,
        model_artifact_uri: String,
    },
    DeploymentSkipped {
        job_name: String,
        reason: String,
    },
    ApprovalRequested {
        job_name: String,
        topic: String,
        message_id: String,
    },
    ApprovalNotificationFailed {
        job_name: String,
        topic: String,
        error: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::StorageEventIgnored { .. } => "storage_event_ignored",
            Self::PipelineExecutionStarted { .. } => "pipeline_execution_started",
            Self::PipelineStartSkipped { .. } => "pipeline_start_skipped",
            Self::TrainingJobSubmitted { .. } => "training_job_submitted",
            Self::TrainingJobRejected { .. } => "training_job_rejected",
            Self::TrainingJobStatusChanged { .. } => "training_job_status_changed",
            Self::DeploymentRequested { .. } => "deployment_requested",
            Self::DeploymentSkipped { .. } => "deployment_skipped",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::ApprovalNotificationFailed { .. } => "approval_notification_failed",
        }
    }

    /// Job this event is about, if any.
    pub fn job_name(&self) -> Option<&str> {
        match self {
            Self::TrainingJobSubmitted { job_name, .. }
            | Self::TrainingJobRejected { job_name, .. }
            | Self::TrainingJobStatusChanged { job_name, .. }
            | Self::DeploymentRequested { job_name, .. }
            | Self::DeploymentSkipped { job_name, .. }
            | Self::ApprovalRequested { job_name, .. }
            | Self::ApprovalNotificationFailed { job_name, .. } => Some(job_name),
            _ => None,
        }
    }

    /// Pipeline execution this event is about, if any.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::PipelineExecutionStarted { execution_id, .. }
            | Self::TrainingJobSubmitted { execution_id, .. }
            | Self::TrainingJobRejected { execution_id, .. } => Some(execution_id),
            Self::PipelineStartSkipped {
                latest_execution_id,
                ..
            } => latest_execution_id.as_deref(),
            _ => None,
        }
    }
}

/// A stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub job_name: Option<String>,
    pub execution_id: Option<String>,
    pub data: AuditEvent,
}
