//! Training job submission on build completion.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::backend::{InputData, TrainingBackend, TrainingJobRequest};
use crate::config::TrainingConfig;
use crate::events::BuildCompletedEvent;
use crate::job::{
    base_job_name, suffixed_job_name, CreateJobRequest, JobRecord, JobStatus, JobStore,
    JobStoreError,
};
use crate::metrics;

use super::{emit, EventConsumer, OrchestrationError, Outcome, SkipReason, SubmittedJob};

/// Writes the job record and submits the training request.
pub struct TrainingSubmitter {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn TrainingBackend>,
    config: TrainingConfig,
    audit: Option<AuditHandle>,
}

/// Result of reserving a job name in the store.
enum Reservation {
    Created(String),
    /// The record this execution already owns.
    Duplicate(JobRecord),
}

impl TrainingSubmitter {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn TrainingBackend>,
        config: TrainingConfig,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            store,
            backend,
            config,
            audit,
        }
    }

    /// Build the backend request for a reserved job name.
    pub fn training_request(&self, job_name: &str, image_reference: &str) -> TrainingJobRequest {
        let prefixes = &self.config.data_prefixes;
        TrainingJobRequest {
            job_name: job_name.to_string(),
            role_arn: self.config.role_arn.clone(),
            image_uri: image_reference.to_string(),
            input_data: InputData {
                training_uri: prefixes.training.clone(),
                validation_uri: prefixes.validation.clone(),
                testing_uri: prefixes.testing.clone(),
            },
            output_uri: self.config.output_uri.clone(),
            instance_type: self.config.instance_type.clone(),
            instance_count: self.config.instance_count,
            volume_size_gb: self.config.volume_size_gb,
            max_runtime_seconds: self.config.max_runtime_seconds,
        }
    }

    pub async fn submit(
        &self,
        event: &BuildCompletedEvent,
    ) -> Result<Outcome<SubmittedJob>, OrchestrationError> {
        event.validate()?;

        let job_name = match self.reserve(event)? {
            Reservation::Created(name) => name,
            Reservation::Duplicate(existing) => {
                if existing.status == JobStatus::Pending {
                    // Never reached the backend: a crash or a store failure
                    // interrupted the earlier attempt.
                    warn!(
                        job_name = %existing.job_name,
                        execution_id = %event.execution_id,
                        created_at = %existing.created_at,
                        "Training job stranded in Pending for this execution, skipping; \
                         re-run the pipeline to submit again"
                    );
                } else {
                    info!(
                        job_name = %existing.job_name,
                        execution_id = %event.execution_id,
                        status = %existing.status,
                        "Training job already recorded for this execution, skipping"
                    );
                }
                metrics::TRAINING_SUBMISSIONS
                    .with_label_values(&["duplicate"])
                    .inc();
                return Ok(Outcome::Skipped(SkipReason::DuplicateSubmission));
            }
        };

        let request = self.training_request(&job_name, &event.image_reference);
        if let Err(e) = self.backend.create_training_job(&request).await {
            let transient = e.is_transient();
            error!(
                job_name = %job_name,
                execution_id = %event.execution_id,
                transient,
                "Training submission failed: {}",
                e
            );
            // The backend error is returned even if recording it fails.
            if let Err(store_err) =
                self.store
                    .update_status(&job_name, JobStatus::Failed, Some(e.to_string()))
            {
                error!(
                    job_name = %job_name,
                    execution_id = %event.execution_id,
                    "Failed to mark training job as failed: {}",
                    store_err
                );
            }
            metrics::TRAINING_SUBMISSIONS
                .with_label_values(&[if transient { "transient" } else { "rejected" }])
                .inc();
            emit(
                &self.audit,
                AuditEvent::TrainingJobRejected {
                    job_name: job_name.clone(),
                    execution_id: event.execution_id.clone(),
                    reason: e.to_string(),
                    transient,
                },
            )
            .await;
            return Err(e.into());
        }

        self.store
            .update_status(&job_name, JobStatus::Submitted, None)?;

        info!(
            job_name = %job_name,
            execution_id = %event.execution_id,
            source_commit = %event.source_commit,
            "Training job submitted"
        );
        metrics::TRAINING_SUBMISSIONS
            .with_label_values(&["submitted"])
            .inc();
        emit(
            &self.audit,
            AuditEvent::TrainingJobSubmitted {
                job_name: job_name.clone(),
                execution_id: event.execution_id.clone(),
                source_commit: event.source_commit.clone(),
                image_reference: event.image_reference.clone(),
            },
        )
        .await;

        Ok(Outcome::Done(SubmittedJob {
            job_name,
            execution_id: event.execution_id.clone(),
            source_commit: event.source_commit.clone(),
            image_reference: event.image_reference.clone(),
        }))
    }

    /// Create the record under the base name, falling back to the
    /// execution-suffixed name when another execution owns the base name.
    fn reserve(&self, event: &BuildCompletedEvent) -> Result<Reservation, OrchestrationError> {
        let candidates = [
            base_job_name(&event.source_commit),
            suffixed_job_name(&event.source_commit, &event.execution_id),
        ];

        for job_name in candidates {
            let request = CreateJobRequest {
                job_name: job_name.clone(),
                execution_id: event.execution_id.clone(),
                source_commit: event.source_commit.clone(),
                image_reference: event.image_reference.clone(),
            };

            match self.store.create(request) {
                Ok(record) => return Ok(Reservation::Created(record.job_name)),
                Err(JobStoreError::AlreadyExists(_)) => {
                    let existing = self
                        .store
                        .get(&job_name)?
                        .ok_or_else(|| JobStoreError::NotFound(job_name.clone()))?;
                    if existing.execution_id == event.execution_id {
                        return Ok(Reservation::Duplicate(existing));
                    }
                    warn!(
                        job_name = %job_name,
                        execution_id = %event.execution_id,
                        owner_execution_id = %existing.execution_id,
                        "Job name taken by another execution"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(JobStoreError::AlreadyExists(suffixed_job_name(
            &event.source_commit,
            &event.execution_id,
        ))
        .into())
    }
}

#[async_trait]
impl EventConsumer<BuildCompletedEvent> for TrainingSubmitter {
    type Output = SubmittedJob;

    async fn consume(
        &self,
        event: BuildCompletedEvent,
    ) -> Result<Outcome<SubmittedJob>, OrchestrationError> {
        self.submit(&event).await
    }
}
