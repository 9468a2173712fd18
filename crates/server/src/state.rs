use std::sync::Arc;

use trainflow_core::{
    AuditHandle, AuditStore, Authenticator, Config, Controller, JobStore, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    job_store: Arc<dyn JobStore>,
    controller: Controller,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        job_store: Arc<dyn JobStore>,
        controller: Controller,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit,
            audit_store,
            job_store,
            controller,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use trainflow_core::{
        create_audit_system, create_authenticator,
        testing::{fixtures, MockNotifier, MockPipelineRunner, MockTrainingBackend},
        AuthConfig, ControllerDeps, SqliteAuditStore, SqliteJobStore,
    };

    /// State over in-memory stores and mock backends.
    pub(crate) fn test_state(auth: AuthConfig) -> Arc<AppState> {
        let mut config = fixtures::config();
        config.auth = auth;

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).unwrap());
        let audit_store: Arc<dyn AuditStore> = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (audit, _writer) = create_audit_system(Arc::clone(&audit_store), 16);
        let job_store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::in_memory().unwrap());

        let controller = Controller::new(
            &config,
            ControllerDeps {
                store: Arc::clone(&job_store),
                runner: Arc::new(MockPipelineRunner::with_pipeline(fixtures::PIPELINE_ID)),
                training: Arc::new(MockTrainingBackend::new()),
                notifier: Arc::new(MockNotifier::new()),
                lease: None,
                audit: None,
            },
        )
        .unwrap();

        Arc::new(AppState::new(
            config,
            authenticator,
            audit,
            audit_store,
            job_store,
            controller,
        ))
    }
}
