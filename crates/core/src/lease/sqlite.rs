use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{LeaseError, PipelineLease};

/// SQLite-backed pipeline leases, one row per pipeline id.
pub struct SqliteLeaseStore {
    conn: Mutex<Connection>,
}

impl SqliteLeaseStore {
    pub fn new(path: &Path) -> Result<Self, LeaseError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, LeaseError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LeaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_leases (
                pipeline_id TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(db_err)
    }
}

impl PipelineLease for SqliteLeaseStore {
    fn try_acquire(
        &self,
        pipeline_id: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let expires_at = now.saturating_add(ttl.as_millis() as i64);

        // Upsert only wins over an expired row or our own row.
        let changed = conn
            .execute(
                r#"
                INSERT INTO pipeline_leases (pipeline_id, holder, expires_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(pipeline_id) DO UPDATE
                SET holder = excluded.holder, expires_at = excluded.expires_at
                WHERE pipeline_leases.expires_at <= ?4 OR pipeline_leases.holder = ?2
                "#,
                params![pipeline_id, holder, expires_at, now],
            )
            .map_err(db_err)?;

        Ok(changed > 0)
    }

    fn release(&self, pipeline_id: &str, holder: &str) -> Result<(), LeaseError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM pipeline_leases WHERE pipeline_id = ? AND holder = ?",
            params![pipeline_id, holder],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> LeaseError {
    LeaseError::Database(e.to_string())
}
