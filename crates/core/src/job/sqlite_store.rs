//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{CreateJobRequest, JobFilter, JobRecord, JobStatus, JobStore, JobStoreError};

const SELECT_COLUMNS: &str = "job_name, status, execution_id, source_commit, image_reference, \
     model_artifact_uri, failure_reason, endpoint_name, deployment_requested_at, \
     created_at, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and the job table.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS training_jobs (
                job_name TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                execution_id TEXT NOT NULL,
                source_commit TEXT NOT NULL,
                image_reference TEXT NOT NULL,
                model_artifact_uri TEXT,
                failure_reason TEXT,
                endpoint_name TEXT,
                deployment_requested_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_training_jobs_status ON training_jobs(status);
            CREATE INDEX IF NOT EXISTS idx_training_jobs_commit ON training_jobs(source_commit);
            CREATE INDEX IF NOT EXISTS idx_training_jobs_created_at ON training_jobs(created_at);
            "#,
        )
        .map_err(db_err)
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref commit) = filter.source_commit {
            conditions.push("source_commit = ?");
            params.push(Box::new(commit.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let status_str: String = row.get(1)?;
        let status = status_str.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        let deployment_requested_at: Option<String> = row.get(8)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(JobRecord {
            job_name: row.get(0)?,
            status,
            execution_id: row.get(2)?,
            source_commit: row.get(3)?,
            image_reference: row.get(4)?,
            model_artifact_uri: row.get(5)?,
            failure_reason: row.get(6)?,
            endpoint_name: row.get(7)?,
            deployment_requested_at: deployment_requested_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn fetch(conn: &Connection, job_name: &str) -> Result<Option<JobRecord>, JobStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM training_jobs WHERE job_name = ?", SELECT_COLUMNS),
            params![job_name],
            Self::row_to_record,
        )
        .optional()
        .map_err(db_err)
    }

    fn fetch_existing(conn: &Connection, job_name: &str) -> Result<JobRecord, JobStoreError> {
        Self::fetch(conn, job_name)?.ok_or_else(|| JobStoreError::NotFound(job_name.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<JobRecord, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let status = JobStatus::Pending;

        // The primary key makes this a create-if-absent write.
        let result = conn.execute(
            "INSERT INTO training_jobs (job_name, status, execution_id, source_commit, image_reference, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                request.job_name,
                status.as_str(),
                request.execution_id,
                request.source_commit,
                request.image_reference,
                stamp(&now),
                stamp(&now),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(JobStoreError::AlreadyExists(request.job_name));
            }
            Err(e) => return Err(db_err(e)),
        }

        Ok(JobRecord {
            job_name: request.job_name,
            status,
            execution_id: request.execution_id,
            source_commit: request.source_commit,
            image_reference: request.image_reference,
            model_artifact_uri: None,
            failure_reason: None,
            endpoint_name: None,
            deployment_requested_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, job_name: &str) -> Result<Option<JobRecord>, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, job_name)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM training_jobs {} ORDER BY created_at DESC, job_name ASC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_record)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM training_jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn update_status(
        &self,
        job_name: &str,
        status: JobStatus,
        failure_reason: Option<String>,
    ) -> Result<JobRecord, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        let current = Self::fetch_existing(&conn, job_name)?;

        if !current.status.can_transition_to(status) {
            return Err(JobStoreError::InvalidTransition {
                job_name: job_name.to_string(),
                from: current.status,
                to: status,
            });
        }
        if current.status == status {
            return Ok(current);
        }

        let failure_reason = if status == JobStatus::Failed {
            failure_reason
        } else {
            None
        };
        let now = Utc::now();

        conn.execute(
            "UPDATE training_jobs SET status = ?, failure_reason = ?, updated_at = ? WHERE job_name = ?",
            params![status.as_str(), failure_reason, stamp(&now), job_name],
        )
        .map_err(db_err)?;

        Ok(JobRecord {
            status,
            failure_reason,
            updated_at: now,
            ..current
        })
    }

    fn record_artifact(
        &self,
        job_name: &str,
        model_artifact_uri: &str,
    ) -> Result<JobRecord, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        let current = Self::fetch_existing(&conn, job_name)?;

        if let Some(existing) = current.model_artifact_uri.as_deref() {
            if existing == model_artifact_uri {
                return Ok(current);
            }
            return Err(JobStoreError::ArtifactAlreadySet {
                job_name: job_name.to_string(),
                existing: existing.to_string(),
            });
        }

        if !current.status.can_transition_to(JobStatus::Succeeded) {
            return Err(JobStoreError::InvalidTransition {
                job_name: job_name.to_string(),
                from: current.status,
                to: JobStatus::Succeeded,
            });
        }

        let now = Utc::now();
        // Guarded on NULL so a racing writer cannot overwrite the artifact.
        let updated = conn
            .execute(
                "UPDATE training_jobs SET status = ?, model_artifact_uri = ?, updated_at = ? WHERE job_name = ? AND model_artifact_uri IS NULL",
                params![
                    JobStatus::Succeeded.as_str(),
                    model_artifact_uri,
                    stamp(&now),
                    job_name
                ],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Self::fetch_existing(&conn, job_name);
        }

        Ok(JobRecord {
            status: JobStatus::Succeeded,
            model_artifact_uri: Some(model_artifact_uri.to_string()),
            updated_at: now,
            ..current
        })
    }

    fn claim_deployment(&self, job_name: &str) -> Result<bool, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_existing(&conn, job_name)?;

        let now = stamp(&Utc::now());
        let claimed = conn
            .execute(
                "UPDATE training_jobs SET deployment_requested_at = ?, updated_at = ? WHERE job_name = ? AND deployment_requested_at IS NULL",
                params![now, now, job_name],
            )
            .map_err(db_err)?;
        Ok(claimed == 1)
    }

    fn release_deployment_claim(&self, job_name: &str) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE training_jobs SET deployment_requested_at = NULL, updated_at = ? WHERE job_name = ? AND endpoint_name IS NULL",
            params![stamp(&Utc::now()), job_name],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn mark_deployment_requested(
        &self,
        job_name: &str,
        endpoint_name: &str,
    ) -> Result<JobRecord, JobStoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "UPDATE training_jobs SET deployment_requested_at = COALESCE(deployment_requested_at, ?), endpoint_name = ?, updated_at = ? WHERE job_name = ?",
            params![stamp(&now), endpoint_name, stamp(&now), job_name],
        )
        .map_err(db_err)?;

        Self::fetch_existing(&conn, job_name)
    }
}

fn stamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(e: rusqlite::Error) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

// Timestamps are always written by this store as RFC 3339.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
