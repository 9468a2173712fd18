use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Prefix of environment variables that override file values.
///
/// Nested keys are joined with a double underscore:
/// `TRAINFLOW_TRAINING__INSTANCE_TYPE=ml.g5.xlarge` sets `training.instance_type`.
pub const ENV_PREFIX: &str = "TRAINFLOW_";

fn layered(path: &Path) -> Figment {
    Figment::from(Toml::file(path)).merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    layered(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a TOML document with no environment layer.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
