//! Downstream topic publishing

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

/// Publishes serialized trades to a downstream topic
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError>;
}

/// Errors that can occur while publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Invalid topic URL {topic}: {error}")]
    InvalidTopic { topic: String, error: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Topic rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Publishes to an HTTP topic endpoint, one POST per message
#[derive(Debug, Clone)]
pub struct HttpTopicPublisher {
    client: reqwest::Client,
    topic: Url,
}

impl HttpTopicPublisher {
    pub fn new(topic: &str) -> Result<Self, PublishError> {
        let topic = Url::parse(topic).map_err(|e| PublishError::InvalidTopic {
            topic: topic.to_string(),
            error: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, topic })
    }

    pub fn topic(&self) -> &Url {
        &self.topic
    }
}

#[async_trait]
impl TopicPublisher for HttpTopicPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        let response = self
            .client
            .post(self.topic.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// In-memory publisher that records every payload
#[derive(Debug, Default)]
pub struct MemoryTopicPublisher {
    messages: Mutex<Vec<Bytes>>,
}

impl MemoryTopicPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Bytes> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl TopicPublisher for MemoryTopicPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.messages.lock().push(payload);
        Ok(())
    }
}
