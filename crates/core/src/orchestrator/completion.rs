//! Applies training status events to job records.
//!
//! This is the only writer of `model_artifact_uri`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::events::{EventError, TrainingState, TrainingStatusEvent};
use crate::job::{JobRecord, JobStatus, JobStore, JobStoreError};
use crate::metrics;

use super::{emit, OrchestrationError, Outcome, SkipReason, StatusApplied};

pub struct CompletionHandler {
    store: Arc<dyn JobStore>,
    audit: Option<AuditHandle>,
}

impl CompletionHandler {
    pub fn new(store: Arc<dyn JobStore>, audit: Option<AuditHandle>) -> Self {
        Self { store, audit }
    }

    pub async fn apply(
        &self,
        event: &TrainingStatusEvent,
    ) -> Result<Outcome<StatusApplied>, OrchestrationError> {
        event.validate()?;
        metrics::TRAINING_COMPLETIONS
            .with_label_values(&[event.status.as_str()])
            .inc();

        let current = self.store.get(&event.job_name)?.ok_or_else(|| {
            warn!(job_name = %event.job_name, "Training status for unknown job");
            OrchestrationError::RecordNotFound(event.job_name.clone())
        })?;

        let result = match event.status {
            TrainingState::InProgress => {
                self.store
                    .update_status(&event.job_name, JobStatus::InProgress, None)
            }
            TrainingState::Completed => {
                // validate() guarantees the artifact is present.
                let uri = event.model_artifact_uri.as_deref().unwrap_or_default();
                self.store.record_artifact(&event.job_name, uri)
            }
            TrainingState::Failed | TrainingState::Stopped => {
                let reason = event
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| format!("training {}", event.status.as_str()));
                self.store
                    .update_status(&event.job_name, JobStatus::Failed, Some(reason))
            }
        };

        let updated = match result {
            Ok(record) => record,
            Err(JobStoreError::InvalidTransition { from, to, .. }) => {
                debug!(
                    job_name = %event.job_name,
                    from = %from,
                    to = %to,
                    "Ignoring out-of-order training status"
                );
                return Ok(Outcome::Skipped(SkipReason::StaleStatus));
            }
            Err(JobStoreError::ArtifactAlreadySet { existing, .. }) => {
                warn!(
                    job_name = %event.job_name,
                    existing = %existing,
                    "Completion reported a different model artifact"
                );
                return Err(EventError::Malformed(format!(
                    "model artifact for {} already recorded as {}",
                    event.job_name, existing
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let changed = updated.status != current.status;
        if changed {
            self.record_change(&current, &updated).await;
        }

        Ok(Outcome::Done(StatusApplied {
            job_name: updated.job_name,
            status: updated.status,
            changed,
        }))
    }

    async fn record_change(&self, before: &JobRecord, after: &JobRecord) {
        match after.status {
            JobStatus::Failed => warn!(
                job_name = %after.job_name,
                execution_id = %after.execution_id,
                reason = after.failure_reason.as_deref().unwrap_or("-"),
                "Training job failed"
            ),
            _ => info!(
                job_name = %after.job_name,
                execution_id = %after.execution_id,
                from = %before.status,
                to = %after.status,
                "Training job status changed"
            ),
        }

        emit(
            &self.audit,
            AuditEvent::TrainingJobStatusChanged {
                job_name: after.job_name.clone(),
                from_status: before.status.to_string(),
                to_status: after.status.to_string(),
                reason: after.failure_reason.clone(),
            },
        )
        .await;
    }
}
