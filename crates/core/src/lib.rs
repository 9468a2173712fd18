pub mod audit;
pub mod auth;
pub mod backend;
pub mod config;
pub mod events;
pub mod job;
pub mod lease;
pub mod metrics;
pub mod orchestrator;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use backend::{
    BackendError, HttpNotifier, HttpPipelineRunner, HttpTrainingBackend, Notifier,
    PipelineRunner, TrainingBackend,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, BackendEndpoint,
    Config, ConfigError, DatabaseConfig, SanitizedConfig, ServerConfig,
};
pub use events::{
    parse_storage_notification, BuildCompletedEvent, EventError, ObjectCreatedEvent,
    TrainingState, TrainingStatusEvent,
};
pub use job::{JobFilter, JobRecord, JobStatus, JobStore, JobStoreError, SqliteJobStore};
pub use lease::{PipelineLease, SqliteLeaseStore};
pub use orchestrator::{
    Controller, ControllerDeps, EventConsumer, OrchestrationError, Outcome, SkipReason,
};
