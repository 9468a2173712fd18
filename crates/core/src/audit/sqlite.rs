use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    event_type TEXT NOT NULL,
    job_name TEXT,
    execution_id TEXT,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_job ON audit_events(job_name);
CREATE INDEX IF NOT EXISTS idx_audit_execution ON audit_events(execution_id);
CREATE INDEX IF NOT EXISTS idx_audit_type ON audit_events(event_type);
"#;

const COLUMNS: &str = "id, timestamp, event_type, job_name, execution_id, data";

/// Audit trail in a SQLite table. Shares the database file with the job store.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        Self::with_connection(Connection::open(path).map_err(db_err)?)
    }

    pub fn in_memory() -> Result<Self, AuditError> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// `WHERE` clause and its bound values for a filter.
fn where_clause(filter: &AuditFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let text_columns = [
        ("job_name = ?", &filter.job_name),
        ("execution_id = ?", &filter.execution_id),
        ("event_type = ?", &filter.event_type),
    ];
    for (clause, wanted) in text_columns {
        if let Some(wanted) = wanted {
            clauses.push(clause);
            values.push(Value::Text(wanted.clone()));
        }
    }
    if let Some(from) = &filter.from {
        clauses.push("timestamp >= ?");
        values.push(Value::Text(stamp(from)));
    }
    if let Some(to) = &filter.to {
        clauses.push("timestamp <= ?");
        values.push(Value::Text(stamp(to)));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

type RawRow = (i64, String, String, Option<String>, Option<String>, String);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(raw: RawRow) -> Result<AuditRecord, AuditError> {
    let (id, timestamp, event_type, job_name, execution_id, data) = raw;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| AuditError::Database(format!("bad timestamp {:?}: {}", timestamp, e)))?
        .with_timezone(&Utc);
    let data: AuditEvent =
        serde_json::from_str(&data).map_err(|e| AuditError::Serialization(e.to_string()))?;

    Ok(AuditRecord {
        id,
        timestamp,
        event_type,
        job_name,
        execution_id,
        data,
    })
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, job_name, execution_id, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                stamp(&record.timestamp),
                record.event_type,
                record.job_name,
                record.execution_id,
                data,
            ],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let (clause, mut values) = where_clause(filter);
        values.push(Value::Integer(filter.limit));
        values.push(Value::Integer(filter.offset));

        // id orders events stamped within the same microsecond.
        let sql = format!(
            "SELECT {} FROM audit_events {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            COLUMNS, clause
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values), raw_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter().map(decode).collect()
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let (clause, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_events {}", clause);

        let conn = self.conn.lock().unwrap();
        conn.query_row(&sql, params_from_iter(values), |row| row.get(0))
            .map_err(db_err)
    }
}

/// Fixed-width UTC so stored timestamps compare correctly as text.
fn stamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(e: rusqlite::Error) -> AuditError {
    AuditError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_for(event: AuditEvent) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            job_name: event.job_name().map(String::from),
            execution_id: event.execution_id().map(String::from),
            data: event,
        }
    }

    fn service_started() -> AuditRecord {
        record_for(AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        })
    }

    fn job_submitted(job_name: &str, execution_id: &str) -> AuditRecord {
        record_for(AuditEvent::TrainingJobSubmitted {
            job_name: job_name.to_string(),
            execution_id: execution_id.to_string(),
            source_commit: "abc".to_string(),
            image_reference: "registry/train:abc".to_string(),
        })
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteAuditStore::in_memory().unwrap();

        let id = store.insert(&service_started()).unwrap();
        assert!(id > 0);

        let results = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].event_type, "service_started");
    }

    #[test]
    fn test_query_by_event_type() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&service_started()).unwrap();
        store.insert(&job_submitted("job-1", "exec-1")).unwrap();
        store.insert(&job_submitted("job-2", "exec-2")).unwrap();

        let filter = AuditFilter::new().with_event_type("training_job_submitted");
        assert_eq!(store.query(&filter).unwrap().len(), 2);
    }

    #[test]
    fn test_query_by_job_name_and_execution() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store.insert(&job_submitted("job-1", "exec-1")).unwrap();
        store.insert(&job_submitted("job-2", "exec-2")).unwrap();
        store
            .insert(&record_for(AuditEvent::DeploymentSkipped {
                job_name: "job-1".to_string(),
                reason: "not_succeeded".to_string(),
            }))
            .unwrap();

        let results = store
            .query(&AuditFilter::new().with_job_name("job-1"))
            .unwrap();
        assert_eq!(results.len(), 2);
        // Newest first.
        assert_eq!(results[0].event_type, "deployment_skipped");

        let results = store
            .query(&AuditFilter::new().with_execution_id("exec-2"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].job_name.as_deref(), Some("job-2"));
    }

    #[test]
    fn test_query_with_time_range() {
        let store = SqliteAuditStore::in_memory().unwrap();

        let now = Utc::now();
        let mut old_record = service_started();
        old_record.timestamp = now - Duration::hours(2);
        store.insert(&old_record).unwrap();
        store.insert(&service_started()).unwrap();

        let filter = AuditFilter::new().with_time_range(Some(now - Duration::hours(1)), None);
        assert_eq!(store.query(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_pagination_and_count() {
        let store = SqliteAuditStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .insert(&job_submitted(&format!("job-{}", i), "exec-1"))
                .unwrap();
        }

        let page = store
            .query(&AuditFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 5);
        assert_eq!(
            store
                .count(&AuditFilter::new().with_job_name("job-3"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_job_history_is_oldest_first() {
        let store = SqliteAuditStore::in_memory().unwrap();
        for i in 0..3 {
            let mut record = job_submitted("job-1", &format!("exec-{}", i));
            record.timestamp = Utc::now() - Duration::minutes(10 - i);
            store.insert(&record).unwrap();
        }
        store.insert(&job_submitted("job-2", "exec-9")).unwrap();

        let history = store.job_history("job-1").unwrap();
        let executions: Vec<_> = history
            .iter()
            .filter_map(|r| r.execution_id.as_deref())
            .collect();
        assert_eq!(executions, vec!["exec-0", "exec-1", "exec-2"]);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("audit.db");

        let store = SqliteAuditStore::new(&db_path).unwrap();
        store.insert(&service_started()).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.query(&AuditFilter::new()).unwrap().len(), 1);
    }
}
