//! Deployment trigger for succeeded training jobs.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::backend::{DeploymentHandle, DeploymentRequest, TrainingBackend};
use crate::job::{JobRecord, JobStatus, JobStore};
use crate::metrics;

use super::{emit, OrchestrationError, Outcome, SkipReason};

/// Submits a hosting request for a job's model artifact.
///
/// Reads the job record and only writes the "deployment requested" marker.
pub struct DeploymentTrigger {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn TrainingBackend>,
    inference_image_uri: String,
    role_arn: String,
    audit: Option<AuditHandle>,
}

impl DeploymentTrigger {
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn TrainingBackend>,
        inference_image_uri: impl Into<String>,
        role_arn: impl Into<String>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            store,
            backend,
            inference_image_uri: inference_image_uri.into(),
            role_arn: role_arn.into(),
            audit,
        }
    }

    /// Deploy the model for `job_name`. Returns the record read and the handle.
    pub async fn deploy(
        &self,
        job_name: &str,
    ) -> Result<Outcome<(JobRecord, DeploymentHandle)>, OrchestrationError> {
        let Some(record) = self.store.get(job_name)? else {
            error!(job_name, "Deployment requested for unknown job");
            return Err(OrchestrationError::RecordNotFound(job_name.to_string()));
        };

        if record.status != JobStatus::Succeeded {
            warn!(
                job_name,
                status = %record.status,
                "Skipping deployment: training did not succeed"
            );
            return Ok(self.skip(job_name, SkipReason::NotSucceeded).await);
        }

        let Some(model_artifact_uri) = record.model_artifact_uri.clone() else {
            error!(job_name, "Succeeded job has no model artifact");
            metrics::DEPLOYMENTS.with_label_values(&["failed"]).inc();
            return Err(OrchestrationError::MissingArtifact(job_name.to_string()));
        };

        // The claim is a conditional write, so overlapping redeliveries of
        // the same completion cannot both reach the backend.
        if record.deployment_requested() || !self.store.claim_deployment(job_name)? {
            info!(
                job_name,
                endpoint_name = record.endpoint_name.as_deref().unwrap_or("-"),
                "Deployment already requested"
            );
            return Ok(self.skip(job_name, SkipReason::AlreadyDeployed).await);
        }

        let request = DeploymentRequest {
            job_name: job_name.to_string(),
            image_uri: self.inference_image_uri.clone(),
            model_artifact_uri: model_artifact_uri.clone(),
            role_arn: self.role_arn.clone(),
        };

        let handle = match self.backend.create_deployment(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    job_name,
                    transient = e.is_transient(),
                    "Deployment request failed: {}",
                    e
                );
                metrics::DEPLOYMENTS.with_label_values(&["failed"]).inc();
                if let Err(release_err) = self.store.release_deployment_claim(job_name) {
                    error!(job_name, "Failed to release deployment claim: {}", release_err);
                }
                return Err(e.into());
            }
        };

        let record = self
            .store
            .mark_deployment_requested(job_name, &handle.endpoint_name)?;

        info!(
            job_name,
            endpoint_name = %handle.endpoint_name,
            model_artifact_uri = %model_artifact_uri,
            "Deployment requested"
        );
        metrics::DEPLOYMENTS.with_label_values(&["requested"]).inc();
        emit(
            &self.audit,
            AuditEvent::DeploymentRequested {
                job_name: job_name.to_string(),
                endpoint_name: handle.endpoint_name.clone(),
                model_artifact_uri,
            },
        )
        .await;

        Ok(Outcome::Done((record, handle)))
    }

    async fn skip<T>(&self, job_name: &str, reason: SkipReason) -> Outcome<T> {
        metrics::DEPLOYMENTS.with_label_values(&["skipped"]).inc();
        emit(
            &self.audit,
            AuditEvent::DeploymentSkipped {
                job_name: job_name.to_string(),
                reason: reason.as_str().to_string(),
            },
        )
        .await;
        Outcome::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::BackendError;
    use crate::job::{CreateJobRequest, SqliteJobStore};
    use crate::testing::{fixtures, MockTrainingBackend};

    const ARTIFACT: &str = "s3://churn-models/output/job-abc123/model.tar.gz";

    fn setup(
        status: JobStatus,
    ) -> (DeploymentTrigger, Arc<SqliteJobStore>, Arc<MockTrainingBackend>) {
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store
            .create(CreateJobRequest {
                job_name: "job-abc123".into(),
                execution_id: "exec-1".into(),
                source_commit: "abc123".into(),
                image_reference: "registry.local/churn-train:abc123".into(),
            })
            .unwrap();
        match status {
            JobStatus::Pending => {}
            JobStatus::Succeeded => {
                store
                    .update_status("job-abc123", JobStatus::Submitted, None)
                    .unwrap();
                store.record_artifact("job-abc123", ARTIFACT).unwrap();
            }
            other => {
                store
                    .update_status("job-abc123", JobStatus::Submitted, None)
                    .unwrap();
                store.update_status("job-abc123", other, None).unwrap();
            }
        }

        let backend = Arc::new(MockTrainingBackend::new());
        let trigger = DeploymentTrigger::new(
            store.clone(),
            backend.clone(),
            fixtures::INFERENCE_IMAGE,
            "arn:aws:iam::123456789012:role/trainer",
            None,
        );
        (trigger, store, backend)
    }

    #[tokio::test]
    async fn test_deploy_succeeded_job() {
        let (trigger, store, backend) = setup(JobStatus::Succeeded);

        let (record, handle) = trigger.deploy("job-abc123").await.unwrap().done().unwrap();

        assert_eq!(handle.endpoint_name, "job-abc123-endpoint");
        assert!(record.deployment_requested());

        let requests = backend.deployment_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model_artifact_uri, ARTIFACT);
        assert_eq!(requests[0].image_uri, fixtures::INFERENCE_IMAGE);

        let stored = store.get("job-abc123").unwrap().unwrap();
        assert_eq!(stored.endpoint_name.as_deref(), Some("job-abc123-endpoint"));
    }

    #[tokio::test]
    async fn test_second_deploy_is_skipped() {
        let (trigger, _store, backend) = setup(JobStatus::Succeeded);

        trigger.deploy("job-abc123").await.unwrap();
        let outcome = trigger.deploy("job-abc123").await.unwrap();

        assert_eq!(outcome.skip_reason(), Some(SkipReason::AlreadyDeployed));
        assert_eq!(backend.deployment_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unfinished_jobs_are_not_deployed() {
        for status in [JobStatus::Pending, JobStatus::InProgress, JobStatus::Failed] {
            let (trigger, _store, backend) = setup(status);

            let outcome = trigger.deploy("job-abc123").await.unwrap();

            assert_eq!(outcome.skip_reason(), Some(SkipReason::NotSucceeded));
            assert!(backend.deployment_requests().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_job_issues_no_request() {
        let (trigger, _store, backend) = setup(JobStatus::Succeeded);

        let err = trigger.deploy("job-nope").await.unwrap_err();

        assert!(matches!(err, OrchestrationError::RecordNotFound(_)));
        assert!(backend.deployment_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_request_leaves_marker_unset() {
        let (trigger, store, backend) = setup(JobStatus::Succeeded);
        backend
            .set_next_deployment_error(BackendError::Transient("timeout".into()))
            .await;

        let err = trigger.deploy("job-abc123").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!store.get("job-abc123").unwrap().unwrap().deployment_requested());

        // Redelivery can deploy once the backend recovers.
        assert!(trigger.deploy("job-abc123").await.unwrap().is_done());
    }

    #[tokio::test]
    async fn test_overlapping_redeliveries_deploy_once() {
        let (trigger, store, backend) = setup(JobStatus::Succeeded);
        backend.set_deployment_latency(Duration::from_millis(50)).await;

        let (first, second) = tokio::join!(
            trigger.deploy("job-abc123"),
            trigger.deploy("job-abc123")
        );
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_done()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|o| o.skip_reason() == Some(SkipReason::AlreadyDeployed)));
        assert_eq!(backend.deployment_requests().await.len(), 1);

        let stored = store.get("job-abc123").unwrap().unwrap();
        assert_eq!(stored.endpoint_name.as_deref(), Some("job-abc123-endpoint"));
    }
}
