use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed event payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// One object-created notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    pub bucket: String,
    pub object_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

impl ObjectCreatedEvent {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
            event_time: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), EventError> {
        if self.bucket.trim().is_empty() {
            return Err(EventError::MissingField("bucket"));
        }
        if self.object_key.is_empty() {
            return Err(EventError::MissingField("object_key"));
        }
        Ok(())
    }
}

/// Build stage finished producing a training image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCompletedEvent {
    /// Pipeline execution the build belongs to.
    pub execution_id: String,
    pub source_commit: String,
    /// Registry path and tag of the built image.
    pub image_reference: String,
}

impl BuildCompletedEvent {
    pub fn validate(&self) -> Result<(), EventError> {
        if self.execution_id.trim().is_empty() {
            return Err(EventError::MissingField("execution_id"));
        }
        if self.source_commit.trim().is_empty() {
            return Err(EventError::MissingField("source_commit"));
        }
        if self.image_reference.trim().is_empty() {
            return Err(EventError::MissingField("image_reference"));
        }
        Ok(())
    }
}

/// Training job status as reported by the training backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    #[serde(alias = "InProgress")]
    InProgress,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Failed")]
    Failed,
    #[serde(alias = "Stopped")]
    Stopped,
}

impl TrainingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingState::InProgress => "in_progress",
            TrainingState::Completed => "completed",
            TrainingState::Failed => "failed",
            TrainingState::Stopped => "stopped",
        }
    }
}

/// Status change for a submitted training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStatusEvent {
    pub job_name: String,
    pub status: TrainingState,
    /// Required when `status` is `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_artifact_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TrainingStatusEvent {
    pub fn validate(&self) -> Result<(), EventError> {
        if self.job_name.trim().is_empty() {
            return Err(EventError::MissingField("job_name"));
        }
        if self.status == TrainingState::Completed
            && self
                .model_artifact_uri
                .as_deref()
                .map_or(true, |uri| uri.trim().is_empty())
        {
            return Err(EventError::MissingField("model_artifact_uri"));
        }
        Ok(())
    }
}
