//! Event handlers that drive a training pipeline run.
//!
//! Every handler is invoked for one external event and returns without
//! waiting on long-running work. Cross-invocation state lives in the job
//! store and in the pipeline runner's execution history.
//!
//! - **Watcher**: object-created events under the input prefix reach the guard
//! - **Guard**: starts a pipeline execution unless one is in progress
//! - **Submitter**: records and submits a training job when a build completes
//! - **Completion handler**: applies training status, owns the artifact URI
//! - **Deployment trigger** and **approval gate**: host the model, then ask for promotion

mod approval;
mod completion;
mod controller;
mod deployment;
mod guard;
mod submitter;
mod types;
mod watcher;

pub use approval::ApprovalGate;
pub use completion::CompletionHandler;
pub use controller::{Controller, ControllerDeps};
pub use deployment::DeploymentTrigger;
pub use guard::{decide, ExecutionGuard, GuardDecision};
pub use submitter::TrainingSubmitter;
pub use types::*;
pub use watcher::StorageWatcher;

use async_trait::async_trait;

use crate::audit::{AuditEvent, AuditHandle};

/// A handler for one kind of external event.
#[async_trait]
pub trait EventConsumer<E: Send + 'static>: Send + Sync {
    type Output: Send;

    async fn consume(&self, event: E) -> Result<Outcome<Self::Output>, OrchestrationError>;
}

async fn emit(audit: &Option<AuditHandle>, event: AuditEvent) {
    if let Some(ref audit_handle) = audit {
        audit_handle.emit(event).await;
    }
}
