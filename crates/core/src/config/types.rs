use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub training: TrainingConfig,
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    pub backends: BackendsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration for the event ingress
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key (required when method = "api_key")
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("trainflow.db")
}

/// Which pipeline to drive and which storage events start it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Identifier of the pipeline in the pipeline runner.
    pub pipeline_id: String,
    /// Object key prefix that counts as new input data.
    #[serde(default = "default_input_prefix")]
    pub input_prefix: String,
    /// Only accept events from this bucket (any bucket when unset).
    #[serde(default)]
    pub bucket: Option<String>,
}

fn default_input_prefix() -> String {
    "input/data/".to_string()
}

/// Training job defaults injected into every submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    /// Service role the backend assumes for training and hosting.
    pub role_arn: String,
    /// Default training image, used when a build signal carries no image.
    pub training_image_uri: String,
    /// Image used to serve the trained model.
    pub inference_image_uri: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
    #[serde(default = "default_volume_size")]
    pub volume_size_gb: u32,
    #[serde(default = "default_max_runtime")]
    pub max_runtime_seconds: u64,
    /// Where the backend writes model artifacts.
    pub output_uri: String,
    pub data_prefixes: DataPrefixes,
}

fn default_instance_type() -> String {
    "ml.m5.xlarge".to_string()
}

fn default_instance_count() -> u32 {
    1
}

fn default_volume_size() -> u32 {
    30
}

fn default_max_runtime() -> u64 {
    86_400 // 24 hours
}

/// Data channel locations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DataPrefixes {
    pub training: String,
    pub validation: String,
    pub testing: String,
}

/// Manual approval channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApprovalConfig {
    /// Notification topic that reaches the approvers.
    pub topic: String,
    /// Subject line of approval notifications.
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    "Model ready for production approval".to_string()
}

/// Pipeline execution guard tuning.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GuardConfig {
    /// Lease duration for the per-pipeline start lock (disabled when unset).
    #[serde(default)]
    pub lease_secs: Option<u64>,
    /// Stop auto-restarting after this many consecutive failed executions
    /// (unbounded when unset).
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

/// External service endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendsConfig {
    pub pipeline_runner: BackendEndpoint,
    pub training: BackendEndpoint,
    pub notifier: BackendEndpoint,
}

/// One HTTP backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendEndpoint {
    /// Base URL (e.g., "http://localhost:9000")
    pub url: String,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub training: TrainingConfig,
    pub approval: ApprovalConfig,
    pub guard: GuardConfig,
    pub backends: SanitizedBackendsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackendsConfig {
    pub pipeline_runner: SanitizedBackendEndpoint,
    pub training: SanitizedBackendEndpoint,
    pub notifier: SanitizedBackendEndpoint,
}

/// Backend endpoint with the token hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackendEndpoint {
    pub url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
}

impl From<&BackendEndpoint> for SanitizedBackendEndpoint {
    fn from(endpoint: &BackendEndpoint) -> Self {
        Self {
            url: endpoint.url.clone(),
            token_configured: endpoint.token.as_ref().is_some_and(|t| !t.is_empty()),
            timeout_secs: endpoint.timeout_secs,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config.auth.api_key.as_ref().is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            pipeline: config.pipeline.clone(),
            training: config.training.clone(),
            approval: config.approval.clone(),
            guard: config.guard.clone(),
            backends: SanitizedBackendsConfig {
                pipeline_runner: (&config.backends.pipeline_runner).into(),
                training: (&config.backends.training).into(),
                notifier: (&config.backends.notifier).into(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL_TOML: &str = r#"
[auth]
method = "none"

[pipeline]
pipeline_id = "churn-pipeline"

[training]
role_arn = "arn:aws:iam::123456789012:role/trainer"
training_image_uri = "registry.local/churn-train:latest"
inference_image_uri = "registry.local/churn-serve:latest"
output_uri = "s3://models/churn/output"

[training.data_prefixes]
training = "s3://data/input/data/training"
validation = "s3://data/input/data/validation"
testing = "s3://data/input/data/testing"

[approval]
topic = "churn-approvals"

[backends.pipeline_runner]
url = "http://localhost:9001"

[backends.training]
url = "http://localhost:9002"
token = "training-secret"

[backends.notifier]
url = "http://localhost:9003"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL_TOML).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "trainflow.db");
        assert_eq!(config.pipeline.input_prefix, "input/data/");
        assert!(config.pipeline.bucket.is_none());
        assert_eq!(config.training.instance_type, "ml.m5.xlarge");
        assert_eq!(config.training.instance_count, 1);
        assert_eq!(config.training.volume_size_gb, 30);
        assert_eq!(config.training.max_runtime_seconds, 86_400);
        assert_eq!(config.approval.subject, "Model ready for production approval");
        assert!(config.guard.lease_secs.is_none());
        assert!(config.guard.max_consecutive_failures.is_none());
        assert_eq!(config.backends.pipeline_runner.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_missing_training_fails() {
        let toml = r#"
[auth]
method = "none"

[pipeline]
pipeline_id = "p"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_guard_section() {
        let toml = format!(
            "{}\n[guard]\nlease_secs = 30\nmax_consecutive_failures = 3\n",
            MINIMAL_TOML
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.guard.lease_secs, Some(30));
        assert_eq!(config.guard.max_consecutive_failures, Some(3));
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL_TOML).unwrap();
        config.auth.method = AuthMethod::ApiKey;
        config.auth.api_key = Some("super-secret".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert!(sanitized.auth.api_key_configured);
        assert!(sanitized.backends.training.token_configured);
        assert!(!sanitized.backends.notifier.token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("training-secret"));
    }
}
