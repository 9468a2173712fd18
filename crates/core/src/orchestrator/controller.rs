//! Wires the handlers together behind one entry point per event type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::audit::AuditHandle;
use crate::backend::{Notifier, PipelineRunner, TrainingBackend};
use crate::config::Config;
use crate::events::{BuildCompletedEvent, ObjectCreatedEvent, TrainingStatusEvent};
use crate::job::{JobStatus, JobStore};
use crate::lease::PipelineLease;

use super::{
    ApprovalGate, CompletionHandler, DeploymentReport, DeploymentTrigger, EventConsumer,
    ExecutionGuard, OrchestrationError, Outcome, PipelineStart, StorageWatcher, SubmittedJob,
    TrainingStatusReport, TrainingSubmitter,
};

/// Collaborators injected into the [`Controller`].
#[derive(Clone)]
pub struct ControllerDeps {
    pub store: Arc<dyn JobStore>,
    pub runner: Arc<dyn PipelineRunner>,
    pub training: Arc<dyn TrainingBackend>,
    pub notifier: Arc<dyn Notifier>,
    /// Required when `guard.lease_secs` is set.
    pub lease: Option<Arc<dyn PipelineLease>>,
    pub audit: Option<AuditHandle>,
}

/// Event-driven controller linking the pipeline runner and the training backend.
///
/// ```text
/// object created -> watcher -> guard -> (runner starts build)
/// build completed -> submitter -> (backend trains)
/// training status -> completion handler -> deployment trigger -> approval gate
/// ```
pub struct Controller {
    watcher: StorageWatcher,
    submitter: TrainingSubmitter,
    completion: CompletionHandler,
    deployment: DeploymentTrigger,
    approval: ApprovalGate,
}

impl Controller {
    pub fn new(config: &Config, deps: ControllerDeps) -> Result<Self, OrchestrationError> {
        let mut guard = ExecutionGuard::new(
            Arc::clone(&deps.runner),
            config.pipeline.pipeline_id.clone(),
            deps.audit.clone(),
        )
        .with_max_consecutive_failures(config.guard.max_consecutive_failures);

        if let Some(secs) = config.guard.lease_secs {
            let lease = deps.lease.clone().ok_or_else(|| {
                OrchestrationError::Configuration(
                    "guard.lease_secs is set but no lease store was provided".to_string(),
                )
            })?;
            guard = guard.with_lease(lease, Duration::from_secs(secs));
        }

        let training = &config.training;
        Ok(Self {
            watcher: StorageWatcher::new(
                config.pipeline.input_prefix.clone(),
                config.pipeline.bucket.clone(),
                Arc::new(guard),
                deps.audit.clone(),
            ),
            submitter: TrainingSubmitter::new(
                Arc::clone(&deps.store),
                Arc::clone(&deps.training),
                training.clone(),
                deps.audit.clone(),
            ),
            completion: CompletionHandler::new(Arc::clone(&deps.store), deps.audit.clone()),
            deployment: DeploymentTrigger::new(
                Arc::clone(&deps.store),
                Arc::clone(&deps.training),
                training.inference_image_uri.clone(),
                training.role_arn.clone(),
                deps.audit.clone(),
            ),
            approval: ApprovalGate::new(
                Arc::clone(&deps.notifier),
                config.approval.topic.clone(),
                config.approval.subject.clone(),
                deps.audit,
            ),
        })
    }

    pub async fn on_object_created(
        &self,
        event: &ObjectCreatedEvent,
    ) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        self.watcher.handle(event).await
    }

    pub async fn on_build_completed(
        &self,
        event: &BuildCompletedEvent,
    ) -> Result<Outcome<SubmittedJob>, OrchestrationError> {
        self.submitter.submit(event).await
    }

    /// Apply a status change; a Succeeded job continues to deployment and approval.
    pub async fn on_training_status(
        &self,
        event: &TrainingStatusEvent,
    ) -> Result<Outcome<TrainingStatusReport>, OrchestrationError> {
        let applied = match self.completion.apply(event).await? {
            Outcome::Done(applied) => applied,
            Outcome::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
        };

        if applied.status != JobStatus::Succeeded {
            return Ok(Outcome::Done(TrainingStatusReport {
                job_name: applied.job_name,
                status: applied.status,
                changed: applied.changed,
                deployment: None,
            }));
        }

        let deployment = match self.deployment.deploy(&applied.job_name).await? {
            Outcome::Done((record, handle)) => {
                let approval = self.approval.request(&record, &handle).await;
                Outcome::Done(DeploymentReport {
                    job_name: record.job_name.clone(),
                    endpoint_name: handle.endpoint_name,
                    deployment_id: handle.deployment_id,
                    model_artifact_uri: record.model_artifact_uri.unwrap_or_default(),
                    approval_requested: approval.approval_requested,
                })
            }
            Outcome::Skipped(reason) => {
                debug!(job_name = %applied.job_name, reason = %reason, "No new deployment");
                Outcome::Skipped(reason)
            }
        };

        Ok(Outcome::Done(TrainingStatusReport {
            job_name: applied.job_name,
            status: applied.status,
            changed: applied.changed,
            deployment: Some(deployment),
        }))
    }
}

#[async_trait]
impl EventConsumer<ObjectCreatedEvent> for Controller {
    type Output = PipelineStart;

    async fn consume(
        &self,
        event: ObjectCreatedEvent,
    ) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        self.on_object_created(&event).await
    }
}

#[async_trait]
impl EventConsumer<BuildCompletedEvent> for Controller {
    type Output = SubmittedJob;

    async fn consume(
        &self,
        event: BuildCompletedEvent,
    ) -> Result<Outcome<SubmittedJob>, OrchestrationError> {
        self.on_build_completed(&event).await
    }
}

#[async_trait]
impl EventConsumer<TrainingStatusEvent> for Controller {
    type Output = TrainingStatusReport;

    async fn consume(
        &self,
        event: TrainingStatusEvent,
    ) -> Result<Outcome<TrainingStatusReport>, OrchestrationError> {
        self.on_training_status(&event).await
    }
}
