//! Mock training backend for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::backend::{
    BackendError, DeploymentHandle, DeploymentRequest, TrainingBackend, TrainingJobRequest,
};

/// Mock implementation of the TrainingBackend trait.
///
/// Records every training and deployment request. Deployments answer with
/// endpoint `<job_name>-endpoint`.
#[derive(Debug, Default)]
pub struct MockTrainingBackend {
    training_requests: Arc<RwLock<Vec<TrainingJobRequest>>>,
    deployment_requests: Arc<RwLock<Vec<DeploymentRequest>>>,
    next_training_error: Arc<RwLock<Option<BackendError>>>,
    next_deployment_error: Arc<RwLock<Option<BackendError>>>,
    deployment_latency: Arc<RwLock<Option<Duration>>>,
}

impl MockTrainingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn training_requests(&self) -> Vec<TrainingJobRequest> {
        self.training_requests.read().await.clone()
    }

    pub async fn deployment_requests(&self) -> Vec<DeploymentRequest> {
        self.deployment_requests.read().await.clone()
    }

    /// Fail the next `create_training_job` call.
    pub async fn set_next_training_error(&self, error: BackendError) {
        *self.next_training_error.write().await = Some(error);
    }

    /// Fail the next `create_deployment` call.
    pub async fn set_next_deployment_error(&self, error: BackendError) {
        *self.next_deployment_error.write().await = Some(error);
    }

    /// Delay every `create_deployment` call, so overlapping calls can be tested.
    pub async fn set_deployment_latency(&self, latency: Duration) {
        *self.deployment_latency.write().await = Some(latency);
    }
}

#[async_trait]
impl TrainingBackend for MockTrainingBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<(), BackendError> {
        if let Some(err) = self.next_training_error.write().await.take() {
            return Err(err);
        }
        self.training_requests.write().await.push(request.clone());
        Ok(())
    }

    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentHandle, BackendError> {
        let latency = *self.deployment_latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.next_deployment_error.write().await.take() {
            return Err(err);
        }
        let mut requests = self.deployment_requests.write().await;
        requests.push(request.clone());
        Ok(DeploymentHandle {
            endpoint_name: format!("{}-endpoint", request.job_name),
            deployment_id: Some(format!("dep-{}", requests.len())),
        })
    }
}
