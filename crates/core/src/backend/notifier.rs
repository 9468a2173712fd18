//! HTTP notification channel client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BackendEndpoint;

use super::http::HttpBackend;
use super::{BackendError, Notifier};

#[derive(Serialize)]
struct PublishBody<'a> {
    subject: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct Published {
    message_id: String,
}

/// Notification topics reached over HTTP: `POST {url}/topics/{topic}/messages`.
pub struct HttpNotifier {
    http: HttpBackend,
}

impl HttpNotifier {
    pub fn new(endpoint: &BackendEndpoint) -> Result<Self, BackendError> {
        Ok(Self {
            http: HttpBackend::new("notifier", endpoint)?,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<String, BackendError> {
        let path = format!("/topics/{}/messages", urlencoding::encode(topic));
        let builder = self.http.post(&path).json(&PublishBody { subject, message });
        let published: Published = self.http.send_json("publish", builder).await?;
        Ok(published.message_id)
    }
}
