//! Service configuration.
//!
//! A TOML file is the base layer; `TRAINFLOW_`-prefixed environment
//! variables override it (see [`load_config`]). [`validate_config`] runs the
//! checks serde cannot express and must pass before the service starts.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str, ENV_PREFIX};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file {0} does not exist")]
    FileNotFound(String),

    #[error("Config could not be parsed: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}
