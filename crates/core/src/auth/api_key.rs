//! Shared-key authentication for webhook senders.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

const PRINCIPAL: &str = "event_source";

/// Accepts `Authorization: Bearer <key>` or `X-API-Key: <key>`.
pub struct ApiKeyAuthenticator {
    key: Vec<u8>,
}

impl ApiKeyAuthenticator {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }
}

/// The bearer token wins when both headers are present.
fn presented_key(request: &AuthRequest) -> Option<&str> {
    request
        .header("authorization")
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .or_else(|| request.header("x-api-key"))
}

/// Comparison time depends only on the length of the inputs.
fn keys_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let presented = presented_key(request).ok_or(AuthError::NotAuthenticated)?;

        if !keys_equal(presented.as_bytes(), &self.key) {
            return Err(AuthError::InvalidCredentials(
                "API key does not match".to_string(),
            ));
        }

        Ok(Identity {
            principal: PRINCIPAL.to_string(),
            method: self.method_name().to_string(),
        })
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}
