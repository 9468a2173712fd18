//! Types shared by the controller's handlers.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, ExecutionStatus};
use crate::events::EventError;
use crate::job::{JobStatus, JobStoreError};
use crate::lease::LeaseError;

/// Errors surfaced by the controller's handlers.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Missing or invalid identifiers. Needs an operator fix.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rate limiting or temporary unavailability. The caller may redeliver.
    #[error("backend temporarily unavailable: {0}")]
    TransientBackend(String),

    /// Event refers to a job with no record.
    #[error("job record not found: {0}")]
    RecordNotFound(String),

    /// Backend refused a training or deployment request.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventError),

    /// Job is Succeeded but has no model artifact.
    #[error("job {0} succeeded without a model artifact")]
    MissingArtifact(String),

    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),

    #[error("pipeline lease error: {0}")]
    Lease(#[from] LeaseError),
}

impl OrchestrationError {
    /// Only transient backend failures are worth redelivering.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestrationError::TransientBackend(_))
    }
}

impl From<BackendError> for OrchestrationError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(msg) => OrchestrationError::Configuration(msg),
            BackendError::Rejected(msg) => OrchestrationError::SubmissionRejected(msg),
            BackendError::Transient(msg) | BackendError::InvalidResponse(msg) => {
                OrchestrationError::TransientBackend(msg)
            }
        }
    }
}

/// Why a handler deliberately did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Object key is outside the input prefix.
    NonMatchingPrefix,
    /// Object is in a bucket other than the configured one.
    OtherBucket,
    /// Key ends with `/`.
    FolderPlaceholder,
    /// Latest pipeline execution is still running.
    ExecutionInProgress,
    /// Another controller instance holds the pipeline lease.
    LeaseHeld,
    /// Too many consecutive failed executions.
    RetryLimitReached,
    /// A record for this execution already exists.
    DuplicateSubmission,
    /// Status event arrived after the job reached a terminal state.
    StaleStatus,
    /// Job did not finish successfully; nothing to deploy.
    NotSucceeded,
    /// Deployment was already requested for this job.
    AlreadyDeployed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NonMatchingPrefix => "non_matching_prefix",
            SkipReason::OtherBucket => "other_bucket",
            SkipReason::FolderPlaceholder => "folder_placeholder",
            SkipReason::ExecutionInProgress => "execution_in_progress",
            SkipReason::LeaseHeld => "lease_held",
            SkipReason::RetryLimitReached => "retry_limit_reached",
            SkipReason::DuplicateSubmission => "duplicate_submission",
            SkipReason::StaleStatus => "stale_status",
            SkipReason::NotSucceeded => "not_succeeded",
            SkipReason::AlreadyDeployed => "already_deployed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a handler that ran without error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome<T> {
    Done(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(*reason),
            Outcome::Done(_) => None,
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}

/// A pipeline execution started by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStart {
    pub pipeline_id: String,
    pub execution_id: String,
    /// Status of the execution that was latest before this start.
    pub previous_status: Option<ExecutionStatus>,
}

/// A training job accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedJob {
    pub job_name: String,
    pub execution_id: String,
    pub source_commit: String,
    pub image_reference: String,
}

/// Effect of a training status event on the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusApplied {
    pub job_name: String,
    pub status: JobStatus,
    /// False when the event repeated the current state.
    pub changed: bool,
}

/// Result of the approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalResult {
    pub approval_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// A deployment request plus the approval notification that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    pub job_name: String,
    pub endpoint_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    pub model_artifact_uri: String,
    pub approval_requested: bool,
}

/// Everything a training status event led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatusReport {
    pub job_name: String,
    pub status: JobStatus,
    pub changed: bool,
    /// Present once the job has Succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Outcome<DeploymentReport>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(OrchestrationError::TransientBackend("503".into()).is_retryable());
        assert!(!OrchestrationError::SubmissionRejected("quota".into()).is_retryable());
        assert!(!OrchestrationError::RecordNotFound("job-1".into()).is_retryable());
        assert!(!OrchestrationError::Configuration("pipeline".into()).is_retryable());
    }

    #[test]
    fn test_backend_error_mapping() {
        assert!(matches!(
            OrchestrationError::from(BackendError::NotFound("p".into())),
            OrchestrationError::Configuration(_)
        ));
        assert!(matches!(
            OrchestrationError::from(BackendError::Rejected("bad".into())),
            OrchestrationError::SubmissionRejected(_)
        ));
        assert!(OrchestrationError::from(BackendError::Transient("429".into())).is_retryable());
    }

    #[test]
    fn test_outcome_serialization() {
        let skipped: Outcome<SubmittedJob> = Outcome::Skipped(SkipReason::DuplicateSubmission);
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["detail"], "duplicate_submission");

        let done = Outcome::Done(StatusApplied {
            job_name: "job-1".to_string(),
            status: JobStatus::InProgress,
            changed: true,
        });
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["outcome"], "done");
        assert_eq!(json["detail"]["status"], "in_progress");
    }

    #[test]
    fn test_outcome_helpers() {
        let done: Outcome<u32> = Outcome::Done(3);
        assert!(done.is_done());
        assert_eq!(done.clone().map(|v| v * 2).done(), Some(6));
        assert_eq!(done.skip_reason(), None);

        let skipped: Outcome<u32> = Outcome::Skipped(SkipReason::LeaseHeld);
        assert!(!skipped.is_done());
        assert_eq!(skipped.skip_reason(), Some(SkipReason::LeaseHeld));
        assert_eq!(skipped.done(), None);
    }
}
