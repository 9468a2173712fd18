//! Training job metadata store.
//!
//! One [`JobRecord`] per training submission attempt, keyed by job name.
//! Records are never deleted here; retention is an external concern.

mod naming;
mod sqlite_store;
mod store;
mod types;

pub use naming::{base_job_name, suffixed_job_name, MAX_JOB_NAME_LEN};
pub use sqlite_store::SqliteJobStore;
pub use store::{CreateJobRequest, JobFilter, JobStore, JobStoreError};
pub use types::{JobRecord, JobStatus};
