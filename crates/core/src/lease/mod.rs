//! Expiring per-pipeline lease used to narrow the guard's check-then-act race.

mod sqlite;

pub use sqlite::SqliteLeaseStore;

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("database error: {0}")]
    Database(String),
}

/// Conditional-write lock keyed by pipeline id.
pub trait PipelineLease: Send + Sync {
    /// Take the lease for `ttl`. Returns `false` if another holder has an
    /// unexpired lease. Re-acquiring by the same holder extends it.
    fn try_acquire(&self, pipeline_id: &str, holder: &str, ttl: Duration)
        -> Result<bool, LeaseError>;

    /// Drop the lease if `holder` still owns it.
    fn release(&self, pipeline_id: &str, holder: &str) -> Result<(), LeaseError>;
}
