//! HTTP pipeline runner client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::BackendEndpoint;

use super::http::HttpBackend;
use super::{BackendError, ExecutionSummary, PipelineRunner};

#[derive(Deserialize)]
struct ExecutionList {
    executions: Vec<ExecutionSummary>,
}

#[derive(Deserialize)]
struct StartedExecution {
    execution_id: String,
}

/// Pipeline runner reached over HTTP.
///
/// - `GET {url}/pipelines/{id}/executions` -> `{"executions": [...]}`
/// - `POST {url}/pipelines/{id}/executions` -> `{"execution_id": "..."}`
pub struct HttpPipelineRunner {
    http: HttpBackend,
}

impl HttpPipelineRunner {
    pub fn new(endpoint: &BackendEndpoint) -> Result<Self, BackendError> {
        Ok(Self {
            http: HttpBackend::new("pipeline_runner", endpoint)?,
        })
    }

    fn executions_path(pipeline_id: &str) -> String {
        format!("/pipelines/{}/executions", urlencoding::encode(pipeline_id))
    }
}

#[async_trait]
impl PipelineRunner for HttpPipelineRunner {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_recent_executions(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<ExecutionSummary>, BackendError> {
        let request = self.http.get(&Self::executions_path(pipeline_id));
        let list: ExecutionList = self.http.send_json("list_executions", request).await?;
        debug!(pipeline_id, count = list.executions.len(), "Listed pipeline executions");
        Ok(list.executions)
    }

    async fn start_execution(&self, pipeline_id: &str) -> Result<String, BackendError> {
        let request = self
            .http
            .post(&Self::executions_path(pipeline_id))
            .json(&serde_json::json!({}));
        let started: StartedExecution = self.http.send_json("start_execution", request).await?;
        Ok(started.execution_id)
    }
}
