//! In-process server with mock backends.
//!
//! Requests go straight into the router through `tower::ServiceExt::oneshot`,
//! so no port is bound and no external service is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use trainflow_core::{
    create_audit_system, create_authenticator,
    testing::{MockNotifier, MockPipelineRunner, MockTrainingBackend},
    AuditStore, AuthConfig, AuthMethod, Authenticator, Config, Controller, ControllerDeps,
    JobStore, PipelineLease, SqliteAuditStore, SqliteJobStore, SqliteLeaseStore,
};
use trainflow_server::{api::create_router, state::AppState};

pub use trainflow_core::testing::fixtures;

pub struct TestFixture {
    pub router: Router,
    pub config: Config,
    pub runner: Arc<MockPipelineRunner>,
    pub training: Arc<MockTrainingBackend>,
    pub notifier: Arc<MockNotifier>,
    pub job_store: Arc<SqliteJobStore>,
    pub audit_store: Arc<SqliteAuditStore>,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        })
        .await
    }

    /// Fixture requiring `key` on protected routes.
    pub async fn with_api_key(key: &str) -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some(key.to_string()),
        })
        .await
    }

    async fn with_auth(auth: AuthConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut config = fixtures::config();
        config.auth = auth;
        config.database.path = db_path.clone();

        let runner = Arc::new(MockPipelineRunner::with_pipeline(fixtures::PIPELINE_ID));
        let training = Arc::new(MockTrainingBackend::new());
        let notifier = Arc::new(MockNotifier::new());

        let job_store =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let audit_store =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let lease: Arc<dyn PipelineLease> =
            Arc::new(SqliteLeaseStore::new(&db_path).expect("Failed to create lease store"));

        let (audit_handle, audit_writer) =
            create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 100);
        tokio::spawn(audit_writer.run());

        let controller = Controller::new(
            &config,
            ControllerDeps {
                store: Arc::clone(&job_store) as Arc<dyn JobStore>,
                runner: runner.clone(),
                training: training.clone(),
                notifier: notifier.clone(),
                lease: Some(lease),
                audit: Some(audit_handle.clone()),
            },
        )
        .expect("Failed to create controller");

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));

        let state = Arc::new(AppState::new(
            config.clone(),
            authenticator,
            audit_handle,
            Arc::clone(&audit_store) as Arc<dyn AuditStore>,
            Arc::clone(&job_store) as Arc<dyn JobStore>,
            controller,
        ));

        Self {
            router: create_router(state),
            config,
            runner,
            training,
            notifier,
            job_store,
            audit_store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), None).await
    }

    /// POST a raw body, for malformed payloads.
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), None).await
    }

    pub async fn post_with_key(&self, path: &str, body: Value, key: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string()), Some(key))
            .await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
        api_key: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        let body = match body {
            Some(body) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(body)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}
