//! Job store trait and request types.

use thiserror::Error;

use super::{JobRecord, JobStatus};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// No record with this job name.
    #[error("job record not found: {0}")]
    NotFound(String),

    /// Conditional create lost: a record with this name already exists.
    #[error("job record already exists: {0}")]
    AlreadyExists(String),

    /// The requested status change is not allowed from the current status.
    #[error("cannot move job {job_name} from {from} to {to}")]
    InvalidTransition {
        job_name: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// The model artifact URI was already set to a different value.
    #[error("model artifact for job {job_name} already set to {existing}")]
    ArtifactAlreadySet { job_name: String, existing: String },

    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a job record (status starts at `Pending`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateJobRequest {
    pub job_name: String,
    pub execution_id: String,
    pub source_commit: String,
    pub image_reference: String,
}

/// Filter for listing job records.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub source_commit: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            source_commit: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source_commit(mut self, commit: impl Into<String>) -> Self {
        self.source_commit = Some(commit.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Storage backend for job records.
///
/// Implementations must make [`JobStore::create`] a create-if-absent write so
/// that concurrent duplicate events for the same commit cannot both succeed.
pub trait JobStore: Send + Sync {
    /// Create a record in `Pending`. Fails with `AlreadyExists` if the name is taken.
    fn create(&self, request: CreateJobRequest) -> Result<JobRecord, JobStoreError>;

    /// Get a record by job name.
    fn get(&self, job_name: &str) -> Result<Option<JobRecord>, JobStoreError>;

    /// List records matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobStoreError>;

    /// Count records matching the filter (ignores limit/offset).
    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Move a record to a new status. `failure_reason` is stored only for `Failed`.
    fn update_status(
        &self,
        job_name: &str,
        status: JobStatus,
        failure_reason: Option<String>,
    ) -> Result<JobRecord, JobStoreError>;

    /// Record the trained model and mark the job `Succeeded`.
    ///
    /// The artifact is written at most once; repeating the same URI is a no-op.
    fn record_artifact(
        &self,
        job_name: &str,
        model_artifact_uri: &str,
    ) -> Result<JobRecord, JobStoreError>;

    /// Set the "deployment requested" marker if it is not set yet.
    ///
    /// Conditional write: of any number of concurrent callers exactly one
    /// gets `true`.
    fn claim_deployment(&self, job_name: &str) -> Result<bool, JobStoreError>;

    /// Clear a claim that never received an endpoint, after a failed request.
    fn release_deployment_claim(&self, job_name: &str) -> Result<(), JobStoreError>;

    /// Store the endpoint handle of a claimed deployment.
    fn mark_deployment_requested(
        &self,
        job_name: &str,
        endpoint_name: &str,
    ) -> Result<JobRecord, JobStoreError>;
}
