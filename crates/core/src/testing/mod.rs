//! Testing utilities and mock implementations.
//!
//! Mocks for every backend trait plus a [`TestController`] that wires them to
//! an in-memory job store, so the whole event flow can run without real
//! infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use trainflow_core::testing::{fixtures, TestController};
//!
//! let harness = TestController::new();
//! harness.controller.on_object_created(&fixtures::object_created("input/data/training/a.csv")).await?;
//! assert_eq!(harness.runner.start_calls().await.len(), 1);
//! ```

mod mock_notifier;
mod mock_pipeline_runner;
mod mock_training_backend;

pub use mock_notifier::{MockNotifier, PublishedMessage};
pub use mock_pipeline_runner::MockPipelineRunner;
pub use mock_training_backend::MockTrainingBackend;

use std::sync::Arc;

use crate::audit::AuditHandle;
use crate::config::Config;
use crate::job::{JobStore, SqliteJobStore};
use crate::lease::{PipelineLease, SqliteLeaseStore};
use crate::orchestrator::{Controller, ControllerDeps};

/// A controller wired to mocks and in-memory stores.
pub struct TestController {
    pub controller: Controller,
    pub config: Config,
    pub store: Arc<SqliteJobStore>,
    pub lease: Arc<SqliteLeaseStore>,
    pub runner: Arc<MockPipelineRunner>,
    pub training: Arc<MockTrainingBackend>,
    pub notifier: Arc<MockNotifier>,
}

impl Default for TestController {
    fn default() -> Self {
        Self::new()
    }
}

impl TestController {
    /// Controller over [`fixtures::config`].
    pub fn new() -> Self {
        Self::with_config(fixtures::config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, None)
    }

    /// Same as [`TestController::with_config`], emitting audit events to `audit`.
    pub fn with_audit(config: Config, audit: AuditHandle) -> Self {
        Self::build(config, Some(audit))
    }

    fn build(config: Config, audit: Option<AuditHandle>) -> Self {
        let store = Arc::new(SqliteJobStore::in_memory().expect("in-memory job store"));
        let lease = Arc::new(SqliteLeaseStore::in_memory().expect("in-memory lease store"));
        let runner = Arc::new(MockPipelineRunner::with_pipeline(
            config.pipeline.pipeline_id.clone(),
        ));
        let training = Arc::new(MockTrainingBackend::new());
        let notifier = Arc::new(MockNotifier::new());

        let deps = ControllerDeps {
            store: Arc::clone(&store) as Arc<dyn JobStore>,
            runner: runner.clone(),
            training: training.clone(),
            notifier: notifier.clone(),
            lease: Some(Arc::clone(&lease) as Arc<dyn PipelineLease>),
            audit,
        };
        let controller = Controller::new(&config, deps).expect("controller from test config");

        Self {
            controller,
            config,
            store,
            lease,
            runner,
            training,
            notifier,
        }
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::backend::{ExecutionStatus, ExecutionSummary};
    use crate::config::{load_config_from_str, Config};
    use crate::events::{
        BuildCompletedEvent, ObjectCreatedEvent, TrainingState, TrainingStatusEvent,
    };

    pub const PIPELINE_ID: &str = "churn-pipeline";
    pub const BUCKET: &str = "churn-data";
    pub const INFERENCE_IMAGE: &str = "registry.local/churn-serve:latest";

    /// Complete configuration with mock-friendly values.
    pub const CONFIG_TOML: &str = r#"
[auth]
method = "none"

[pipeline]
pipeline_id = "churn-pipeline"
input_prefix = "input/data/"

[training]
role_arn = "arn:aws:iam::123456789012:role/trainer"
training_image_uri = "registry.local/churn-train:latest"
inference_image_uri = "registry.local/churn-serve:latest"
output_uri = "s3://churn-models/output"

[training.data_prefixes]
training = "s3://churn-data/input/data/training"
validation = "s3://churn-data/input/data/validation"
testing = "s3://churn-data/input/data/testing"

[approval]
topic = "churn-approvals"

[backends.pipeline_runner]
url = "http://localhost:9001"

[backends.training]
url = "http://localhost:9002"

[backends.notifier]
url = "http://localhost:9003"
"#;

    pub fn config() -> Config {
        load_config_from_str(CONFIG_TOML).expect("fixture config parses")
    }

    pub fn object_created(object_key: &str) -> ObjectCreatedEvent {
        ObjectCreatedEvent::new(BUCKET, object_key)
    }

    pub fn build_completed(execution_id: &str, source_commit: &str) -> BuildCompletedEvent {
        BuildCompletedEvent {
            execution_id: execution_id.to_string(),
            source_commit: source_commit.to_string(),
            image_reference: format!("registry.local/churn-train:{}", source_commit),
        }
    }

    pub fn training_status(job_name: &str, status: TrainingState) -> TrainingStatusEvent {
        TrainingStatusEvent {
            job_name: job_name.to_string(),
            status,
            model_artifact_uri: None,
            failure_reason: None,
        }
    }

    pub fn training_completed(job_name: &str, model_artifact_uri: &str) -> TrainingStatusEvent {
        TrainingStatusEvent {
            model_artifact_uri: Some(model_artifact_uri.to_string()),
            ..training_status(job_name, TrainingState::Completed)
        }
    }

    pub fn execution(id: &str, status: ExecutionStatus, minutes_ago: i64) -> ExecutionSummary {
        ExecutionSummary {
            execution_id: id.to_string(),
            status,
            started_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }
}
