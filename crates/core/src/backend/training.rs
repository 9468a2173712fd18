//! HTTP training backend client.

use async_trait::async_trait;
use tracing::info;

use crate::config::BackendEndpoint;

use super::http::HttpBackend;
use super::{BackendError, DeploymentHandle, DeploymentRequest, TrainingBackend, TrainingJobRequest};

/// Training and hosting service reached over HTTP.
///
/// - `POST {url}/training-jobs` with a [`TrainingJobRequest`]
/// - `POST {url}/deployments` with a [`DeploymentRequest`], answering a [`DeploymentHandle`]
pub struct HttpTrainingBackend {
    http: HttpBackend,
}

impl HttpTrainingBackend {
    pub fn new(endpoint: &BackendEndpoint) -> Result<Self, BackendError> {
        Ok(Self {
            http: HttpBackend::new("training", endpoint)?,
        })
    }
}

#[async_trait]
impl TrainingBackend for HttpTrainingBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<(), BackendError> {
        let builder = self.http.post("/training-jobs").json(request);
        self.http.send("create_training_job", builder).await?;
        info!(job_name = %request.job_name, "Training backend accepted job");
        Ok(())
    }

    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentHandle, BackendError> {
        let builder = self.http.post("/deployments").json(request);
        self.http.send_json("create_deployment", builder).await
    }
}
