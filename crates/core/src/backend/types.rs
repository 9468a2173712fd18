//! Backend traits and wire types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The addressed resource does not exist (e.g. unknown pipeline).
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused the request (malformed, conflicting or over quota).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Rate limiting, timeouts, connection failures, 5xx.
    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Status of a pipeline execution as reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[serde(alias = "InProgress")]
    InProgress,
    #[serde(alias = "Succeeded")]
    Succeeded,
    #[serde(alias = "Failed")]
    Failed,
    #[serde(alias = "Stopped")]
    Stopped,
    #[serde(alias = "Superseded")]
    Superseded,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::InProgress => "in_progress",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Stopped => "stopped",
            ExecutionStatus::Superseded => "superseded",
        }
    }
}

/// One entry of the runner's execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

/// Data channel locations for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputData {
    pub training_uri: String,
    pub validation_uri: String,
    pub testing_uri: String,
}

/// Training submission sent to the training backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobRequest {
    pub job_name: String,
    pub role_arn: String,
    pub image_uri: String,
    pub input_data: InputData,
    pub output_uri: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_seconds: u64,
}

/// Hosting request sent after training succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub job_name: String,
    /// Inference image.
    pub image_uri: String,
    pub model_artifact_uri: String,
    pub role_arn: String,
}

/// What the backend returns for an accepted deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHandle {
    pub endpoint_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

/// Managed pipeline runner.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Recent executions for a pipeline, in no guaranteed order.
    async fn list_recent_executions(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<ExecutionSummary>, BackendError>;

    /// Request a new execution and return its id.
    async fn start_execution(&self, pipeline_id: &str) -> Result<String, BackendError>;
}

/// Asynchronous training and hosting service.
#[async_trait]
pub trait TrainingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a training job. Success means accepted, not complete.
    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<(), BackendError>;

    /// Request hosting for a trained model.
    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentHandle, BackendError>;
}

/// Notification channel used by the approval gate.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Publish a message and return the channel's message id.
    async fn publish(&self, topic: &str, subject: &str, message: &str)
        -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_accepts_runner_casing() {
        let summary: ExecutionSummary = serde_json::from_str(
            r#"{"execution_id": "exec-1", "status": "Superseded", "started_at": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(summary.status, ExecutionStatus::Superseded);

        let status: ExecutionStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, ExecutionStatus::InProgress);
    }

    #[test]
    fn test_only_transient_errors_are_transient() {
        assert!(BackendError::Transient("503".into()).is_transient());
        assert!(!BackendError::Rejected("quota".into()).is_transient());
        assert!(!BackendError::NotFound("p".into()).is_transient());
    }

    #[test]
    fn test_training_request_wire_shape() {
        let request = TrainingJobRequest {
            job_name: "job-abc".to_string(),
            role_arn: "arn:role".to_string(),
            image_uri: "registry/train:abc".to_string(),
            input_data: InputData {
                training_uri: "s3://d/training".to_string(),
                validation_uri: "s3://d/validation".to_string(),
                testing_uri: "s3://d/testing".to_string(),
            },
            output_uri: "s3://m/out".to_string(),
            instance_type: "ml.m5.xlarge".to_string(),
            instance_count: 1,
            volume_size_gb: 30,
            max_runtime_seconds: 86_400,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input_data"]["validation_uri"], "s3://d/validation");
        assert_eq!(json["max_runtime_seconds"], 86_400);
    }
}
