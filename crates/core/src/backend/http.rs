//! Shared HTTP plumbing for backend clients.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::BackendEndpoint;
use crate::metrics;

use super::BackendError;

/// JSON-over-HTTP client with optional bearer token.
pub(crate) struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    backend: &'static str,
}

impl HttpBackend {
    pub(crate) fn new(
        backend: &'static str,
        endpoint: &BackendEndpoint,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs as u64))
            .build()
            .map_err(|e| {
                BackendError::InvalidResponse(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            token: endpoint.token.clone(),
            backend,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, map failures, and decode the JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Send a request and map transport errors and non-2xx statuses.
    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, BackendError> {
        let start = Instant::now();
        let result = request.send().await;
        metrics::BACKEND_REQUEST_DURATION
            .with_label_values(&[self.backend, operation])
            .observe(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(map_status(status, &body))
            }
            Err(e) => Err(map_transport(e)),
        };

        let label = if outcome.is_ok() { "success" } else { "error" };
        metrics::BACKEND_REQUESTS
            .with_label_values(&[self.backend, operation, label])
            .inc();

        if let Err(ref e) = outcome {
            debug!(backend = self.backend, operation, error = %e, "Backend call failed");
        }
        outcome
    }
}

fn map_transport(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Transient("request timed out".to_string())
    } else if e.is_connect() {
        BackendError::Transient(format!("connection failed: {}", e))
    } else {
        BackendError::Transient(e.to_string())
    }
}

/// Map a non-success HTTP status onto the backend error taxonomy.
pub(crate) fn map_status(status: StatusCode, body: &str) -> BackendError {
    let detail = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )
    };

    match status.as_u16() {
        404 => BackendError::NotFound(detail),
        400 | 402 | 403 | 409 | 422 => BackendError::Rejected(detail),
        429 => BackendError::Transient(detail),
        s if s >= 500 => BackendError::Transient(detail),
        _ => BackendError::InvalidResponse(detail),
    }
}
