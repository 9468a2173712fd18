//! Core job record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a training job.
///
/// ```text
/// Pending -> Submitted -> InProgress -> Succeeded
///    |           |             |
///    +-----------+-------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record written, backend not yet called.
    Pending,
    /// Backend accepted the training request.
    Submitted,
    /// Backend reported the job running.
    InProgress,
    /// Training finished and produced a model artifact.
    Succeeded,
    /// Rejected, failed or stopped.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Submitted => "submitted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether the store may move a record from `self` to `next`.
    ///
    /// Re-applying the current status is allowed so redelivered events are no-ops.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Submitted)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Submitted, JobStatus::InProgress)
                | (JobStatus::Submitted, JobStatus::Succeeded)
                | (JobStatus::Submitted, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Succeeded)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "submitted" => Ok(JobStatus::Submitted),
            "in_progress" => Ok(JobStatus::InProgress),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Durable metadata for one training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Primary key, derived from the source commit.
    pub job_name: String,
    pub status: JobStatus,
    /// Pipeline execution that submitted this job.
    pub execution_id: String,
    /// Immutable once written.
    pub source_commit: String,
    /// Registry path and tag of the training image. Immutable once written.
    pub image_reference: String,
    /// Set once, by the training completion path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_artifact_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Endpoint returned by the hosting request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_name: Option<String>,
    /// When a deployment was requested for this job's artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn deployment_requested(&self) -> bool {
        self.deployment_requested_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Submitted,
            JobStatus::InProgress,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Submitted.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Submitted));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::InProgress));
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Succeeded.can_transition_to(JobStatus::Succeeded));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Succeeded));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Submitted));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Pending));
    }
}
