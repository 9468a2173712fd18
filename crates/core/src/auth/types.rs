use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The parts of an HTTP request an authenticator may inspect.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    headers: HashMap<String, String>,
}

impl AuthRequest {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            headers: pairs
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Who sent an event or query. Attached to the request as an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            principal: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}
