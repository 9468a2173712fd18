use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::AuditEvent;

/// An event stamped with the time it was emitted, not the time it was written.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl From<AuditEvent> for AuditEventEnvelope {
    fn from(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Sending half of the audit channel. Clone one into every emitting component.
///
/// Auditing is best effort: failures are logged, never returned.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Waits for capacity when the writer falls behind.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if self.tx.send(event.into()).await.is_err() {
            tracing::error!(event_type, "Audit writer has stopped; event lost");
        }
    }

    /// Never waits. Returns whether the event was queued.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let event_type = event.event_type();
        match self.tx.try_send(event.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(event_type, "Audit channel full; event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(event_type, "Audit writer has stopped; event lost");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped() -> AuditEvent {
        AuditEvent::ServiceStopped {
            reason: "test".to_string(),
        }
    }

    fn skipped(job_name: &str) -> AuditEvent {
        AuditEvent::DeploymentSkipped {
            job_name: job_name.to_string(),
            reason: "not_succeeded".to_string(),
        }
    }

    #[tokio::test]
    async fn test_clones_feed_one_channel_in_order() {
        let (tx, mut rx) = mpsc::channel(10);
        let first = AuditHandle::new(tx);
        let second = first.clone();

        let before = Utc::now();
        first.emit(skipped("job-1")).await;
        second.emit(stopped()).await;

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(a.event.job_name(), Some("job-1"));
        assert!(matches!(b.event, AuditEvent::ServiceStopped { .. }));
        assert!(a.timestamp >= before && a.timestamp <= b.timestamp);
    }

    #[test]
    fn test_try_emit_reports_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        assert!(handle.try_emit(skipped("job-1")));
        assert!(!handle.try_emit(stopped()));
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_an_error() {
        let (tx, rx) = mpsc::channel::<AuditEventEnvelope>(10);
        let handle = AuditHandle::new(tx);
        drop(rx);

        handle.emit(stopped()).await;
        assert!(!handle.try_emit(stopped()));
    }
}
