//! Mock notification channel for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{BackendError, Notifier};

/// A message captured by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub subject: String,
    pub message: String,
}

/// Mock implementation of the Notifier trait.
#[derive(Debug, Default)]
pub struct MockNotifier {
    published: Arc<RwLock<Vec<PublishedMessage>>>,
    next_error: Arc<RwLock<Option<BackendError>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().await.clone()
    }

    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<String, BackendError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        let mut published = self.published.write().await;
        published.push(PublishedMessage {
            topic: topic.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(format!("msg-{}", published.len()))
    }
}
