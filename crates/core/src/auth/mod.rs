//! Ingress authentication for event webhooks and query routes.
//!
//! The server hands every protected request to one [`Authenticator`], chosen
//! at startup from `[auth]` in the config.

mod api_key;
mod none;
mod types;

pub use api_key::ApiKeyAuthenticator;
pub use none::NoneAuthenticator;
pub use types::{AuthRequest, Identity};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were presented at all.
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authenticator misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Stable name, also reported in [`Identity::method`].
    fn method_name(&self) -> &'static str;
}

pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    let authenticator: Box<dyn Authenticator> = match config.method {
        AuthMethod::None => Box::new(NoneAuthenticator),
        AuthMethod::ApiKey => match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Box::new(ApiKeyAuthenticator::new(key)),
            _ => {
                return Err(AuthError::Misconfigured(
                    "auth.api_key is required for the api_key method".to_string(),
                ))
            }
        },
    };
    Ok(authenticator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(method: AuthMethod, api_key: Option<&str>) -> AuthConfig {
        AuthConfig {
            method,
            api_key: api_key.map(String::from),
        }
    }

    #[test]
    fn test_factory_selects_method() {
        let none = create_authenticator(&auth_config(AuthMethod::None, None)).unwrap();
        assert_eq!(none.method_name(), "none");

        let keyed =
            create_authenticator(&auth_config(AuthMethod::ApiKey, Some("webhook-key"))).unwrap();
        assert_eq!(keyed.method_name(), "api_key");
    }

    #[test]
    fn test_api_key_method_needs_a_key() {
        for key in [None, Some("")] {
            assert!(matches!(
                create_authenticator(&auth_config(AuthMethod::ApiKey, key)),
                Err(AuthError::Misconfigured(_))
            ));
        }
    }
}
