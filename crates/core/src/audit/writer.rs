use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Background task that drains the audit channel into an [`AuditStore`].
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Consume events until every [`AuditHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord {
                id: 0,
                timestamp: envelope.timestamp,
                event_type: envelope.event.event_type().to_string(),
                job_name: envelope.event.job_name().map(String::from),
                execution_id: envelope.event.execution_id().map(String::from),
                data: envelope.event,
            };

            if let Err(e) = self.store.insert(&record) {
                tracing::error!(
                    event_type = %record.event_type,
                    "Failed to write audit event: {}",
                    e
                );
            }
        }

        tracing::info!("Audit writer shutting down");
    }
}

/// Create the audit channel.
///
/// Spawn the writer with `tokio::spawn(writer.run())` and clone the handle
/// into every component that emits events.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::audit::{AuditError, AuditEvent, AuditFilter};

    struct MockStore {
        records: Mutex<Vec<AuditRecord>>,
        should_fail: bool,
    }

    impl MockStore {
        fn new(should_fail: bool) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                should_fail,
            }
        }

        fn get_records(&self) -> Vec<AuditRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl AuditStore for MockStore {
        fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
            if self.should_fail {
                return Err(AuditError::Database("Mock failure".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let mut stored = record.clone();
            stored.id = records.len() as i64 + 1;
            records.push(stored);
            Ok(records.len() as i64)
        }

        fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
            let mut matching: Vec<_> = self
                .get_records()
                .into_iter()
                .filter(|r| filter.matches(r))
                .collect();
            matching.reverse();
            Ok(matching
                .into_iter()
                .skip(filter.offset as usize)
                .take(filter.limit as usize)
                .collect())
        }

        fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
            Ok(self.get_records().iter().filter(|r| filter.matches(r)).count() as i64)
        }
    }

    fn spawn_system(store: &Arc<MockStore>) -> (AuditHandle, tokio::task::JoinHandle<()>) {
        let store_dyn: Arc<dyn AuditStore> = Arc::clone(store) as Arc<dyn AuditStore>;
        let (handle, writer) = create_audit_system(store_dyn, 16);
        (handle, tokio::spawn(writer.run()))
    }

    #[tokio::test]
    async fn test_writer_extracts_job_and_execution_ids() {
        let store = Arc::new(MockStore::new(false));
        let (handle, writer) = spawn_system(&store);

        handle
            .emit(AuditEvent::TrainingJobRejected {
                job_name: "job-abc".to_string(),
                execution_id: "exec-7".to_string(),
                reason: "quota exceeded".to_string(),
                transient: false,
            })
            .await;
        drop(handle);
        writer.await.unwrap();

        let records = store.get_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "training_job_rejected");
        assert_eq!(records[0].job_name.as_deref(), Some("job-abc"));
        assert_eq!(records[0].execution_id.as_deref(), Some("exec-7"));
        assert_eq!(store.count(&AuditFilter::for_job("job-abc")).unwrap(), 1);
        assert!(store.query(&AuditFilter::for_job("job-xyz")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writer_continues_on_insert_failure() {
        let store = Arc::new(MockStore::new(true));
        let (handle, writer) = spawn_system(&store);

        handle
            .emit(AuditEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;
        drop(handle);

        writer.await.unwrap();
        assert!(store.get_records().is_empty());
    }

    #[tokio::test]
    async fn test_writer_waits_for_all_handles_to_drop() {
        let store = Arc::new(MockStore::new(false));
        let (main_handle, writer) = spawn_system(&store);
        let controller_handle = main_handle.clone();

        controller_handle
            .emit(AuditEvent::DeploymentSkipped {
                job_name: "job-1".to_string(),
                reason: "already_deployed".to_string(),
            })
            .await;
        main_handle
            .emit(AuditEvent::ServiceStopped {
                reason: "graceful_shutdown".to_string(),
            })
            .await;
        drop(main_handle);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished(), "Writer should still be running");

        drop(controller_handle);
        let result = tokio::time::timeout(Duration::from_secs(1), writer).await;
        assert!(result.is_ok(), "Writer should exit after all handles drop");

        let records = store.get_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "deployment_skipped");
        assert_eq!(records[1].event_type, "service_stopped");
    }
}
