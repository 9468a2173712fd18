//! Mock pipeline runner for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{BackendError, ExecutionStatus, ExecutionSummary, PipelineRunner};

/// Mock implementation of the PipelineRunner trait.
///
/// Keeps an in-memory execution history. `start_execution` appends a new
/// `InProgress` execution with id `exec-N`, so a second storage event right
/// after a start sees a running pipeline.
///
/// ```rust,ignore
/// let runner = MockPipelineRunner::new();
/// runner.push_execution(fixtures::execution("exec-0", ExecutionStatus::Failed, 10)).await;
/// // ... drive the guard ...
/// assert_eq!(runner.start_calls().await, vec!["churn-pipeline"]);
/// ```
#[derive(Debug)]
pub struct MockPipelineRunner {
    executions: Arc<RwLock<Vec<ExecutionSummary>>>,
    starts: Arc<RwLock<Vec<String>>>,
    list_calls: Arc<RwLock<usize>>,
    /// When set, other pipeline ids are reported as not found.
    known_pipeline: Option<String>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<BackendError>>>,
}

impl Default for MockPipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPipelineRunner {
    pub fn new() -> Self {
        Self {
            executions: Arc::new(RwLock::new(Vec::new())),
            starts: Arc::new(RwLock::new(Vec::new())),
            list_calls: Arc::new(RwLock::new(0)),
            known_pipeline: None,
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Only `pipeline_id` exists; anything else is `NotFound`.
    pub fn with_pipeline(pipeline_id: impl Into<String>) -> Self {
        Self {
            known_pipeline: Some(pipeline_id.into()),
            ..Self::new()
        }
    }

    pub async fn push_execution(&self, execution: ExecutionSummary) {
        self.executions.write().await.push(execution);
    }

    pub async fn set_executions(&self, executions: Vec<ExecutionSummary>) {
        *self.executions.write().await = executions;
    }

    /// Change the status of a recorded execution (e.g. finish a run).
    pub async fn set_status(&self, execution_id: &str, status: ExecutionStatus) {
        let mut executions = self.executions.write().await;
        if let Some(execution) = executions
            .iter_mut()
            .find(|e| e.execution_id == execution_id)
        {
            execution.status = status;
        }
    }

    /// Pipeline ids passed to `start_execution`, in call order.
    pub async fn start_calls(&self) -> Vec<String> {
        self.starts.read().await.clone()
    }

    pub async fn list_call_count(&self) -> usize {
        *self.list_calls.read().await
    }

    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<BackendError> {
        self.next_error.write().await.take()
    }

    fn check_pipeline(&self, pipeline_id: &str) -> Result<(), BackendError> {
        match &self.known_pipeline {
            Some(known) if known != pipeline_id => Err(BackendError::NotFound(format!(
                "pipeline {} does not exist",
                pipeline_id
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PipelineRunner for MockPipelineRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_recent_executions(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<ExecutionSummary>, BackendError> {
        *self.list_calls.write().await += 1;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.check_pipeline(pipeline_id)?;
        Ok(self.executions.read().await.clone())
    }

    async fn start_execution(&self, pipeline_id: &str) -> Result<String, BackendError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.check_pipeline(pipeline_id)?;

        let mut starts = self.starts.write().await;
        starts.push(pipeline_id.to_string());
        let execution_id = format!("exec-{}", starts.len());

        self.executions.write().await.push(ExecutionSummary {
            execution_id: execution_id.clone(),
            status: ExecutionStatus::InProgress,
            started_at: Utc::now(),
        });
        Ok(execution_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_records_in_progress_execution() {
        let runner = MockPipelineRunner::new();

        let id = runner.start_execution("p").await.unwrap();
        assert_eq!(id, "exec-1");

        let executions = runner.list_recent_executions("p").await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::InProgress);
        assert_eq!(runner.start_calls().await, vec!["p".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_pipeline() {
        let runner = MockPipelineRunner::with_pipeline("known");
        assert!(matches!(
            runner.list_recent_executions("other").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(runner.list_recent_executions("known").await.is_ok());
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let runner = MockPipelineRunner::new();
        runner
            .set_next_error(BackendError::Transient("throttled".into()))
            .await;

        assert!(runner.list_recent_executions("p").await.is_err());
        assert!(runner.list_recent_executions("p").await.is_ok());
        assert_eq!(runner.list_call_count().await, 2);
    }
}
