use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;

/// Page size used when a query does not set one.
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit database error: {0}")]
    Database(String),

    #[error("Audit payload could not be (de)serialized: {0}")]
    Serialization(String),
}

/// Query over the audit trail. Unset fields match everything.
///
/// Both ends of the time range are inclusive.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub job_name: Option<String>,
    pub execution_id: Option<String>,
    pub event_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            job_name: None,
            execution_id: None,
            event_type: None,
            from: None,
            to: None,
            limit: DEFAULT_AUDIT_LIMIT,
            offset: 0,
        }
    }
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded about one training job.
    pub fn for_job(job_name: impl Into<String>) -> Self {
        Self::new().with_job_name(job_name)
    }

    pub fn with_job_name(self, job_name: impl Into<String>) -> Self {
        Self {
            job_name: Some(job_name.into()),
            ..self
        }
    }

    pub fn with_execution_id(self, execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            ..self
        }
    }

    pub fn with_event_type(self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..self
        }
    }

    pub fn with_time_range(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to, ..self }
    }

    pub fn with_limit(self, limit: i64) -> Self {
        Self { limit, ..self }
    }

    pub fn with_offset(self, offset: i64) -> Self {
        Self { offset, ..self }
    }

    /// In-memory evaluation of the predicate part (pagination is ignored).
    pub fn matches(&self, record: &AuditRecord) -> bool {
        fn same(wanted: &Option<String>, actual: Option<&str>) -> bool {
            wanted.as_deref().map_or(true, |w| actual == Some(w))
        }

        same(&self.job_name, record.job_name.as_deref())
            && same(&self.execution_id, record.execution_id.as_deref())
            && same(&self.event_type, Some(record.event_type.as_str()))
            && self.from.map_or(true, |from| record.timestamp >= from)
            && self.to.map_or(true, |to| record.timestamp <= to)
    }
}

/// Append-only storage for audit records.
pub trait AuditStore: Send + Sync {
    /// Persist `record` and return its assigned id. `record.id` is ignored.
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Matching records, newest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;

    /// Oldest-first trail of a single job, unpaginated.
    fn job_history(&self, job_name: &str) -> Result<Vec<AuditRecord>, AuditError> {
        let filter = AuditFilter::for_job(job_name);
        let total = self.count(&filter)?;
        let mut records = self.query(&filter.with_limit(total.max(1)))?;
        records.reverse();
        Ok(records)
    }
}
