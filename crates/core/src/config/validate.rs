use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration.
///
/// Anything that would make every training submission or pipeline start fail
/// is rejected here, before the server accepts events.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().unwrap_or("").is_empty()
    {
        return Err(invalid("auth.api_key must be set when auth.method = \"api_key\""));
    }

    require_non_empty("pipeline.pipeline_id", &config.pipeline.pipeline_id)?;

    let training = &config.training;
    require_non_empty("training.role_arn", &training.role_arn)?;
    require_non_empty("training.training_image_uri", &training.training_image_uri)?;
    require_non_empty("training.inference_image_uri", &training.inference_image_uri)?;
    require_non_empty("training.instance_type", &training.instance_type)?;

    if training.instance_count == 0 {
        return Err(invalid("training.instance_count must be at least 1"));
    }
    if training.volume_size_gb == 0 {
        return Err(invalid("training.volume_size_gb must be at least 1"));
    }
    if training.max_runtime_seconds == 0 {
        return Err(invalid("training.max_runtime_seconds must be at least 1"));
    }

    require_uri("training.output_uri", &training.output_uri)?;
    require_uri("training.data_prefixes.training", &training.data_prefixes.training)?;
    require_uri(
        "training.data_prefixes.validation",
        &training.data_prefixes.validation,
    )?;
    require_uri("training.data_prefixes.testing", &training.data_prefixes.testing)?;

    require_non_empty("approval.topic", &config.approval.topic)?;

    if config.guard.lease_secs == Some(0) {
        return Err(invalid("guard.lease_secs cannot be 0"));
    }
    if config.guard.max_consecutive_failures == Some(0) {
        return Err(invalid("guard.max_consecutive_failures cannot be 0"));
    }

    require_uri("backends.pipeline_runner.url", &config.backends.pipeline_runner.url)?;
    require_uri("backends.training.url", &config.backends.training.url)?;
    require_uri("backends.notifier.url", &config.backends.notifier.url)?;

    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn require_uri(field: &str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(field, value)?;
    match value.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok(()),
        _ => Err(invalid(format!(
            "{} must be a URI with a scheme, got '{}'",
            field, value
        ))),
    }
}
