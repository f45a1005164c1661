//! Notification decorators for the agent message store.
//!
//! Both decorators are best-effort: the inner append is the source of truth
//! and a failed publish or POST never unwinds it.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::collaborators::StreamPublisher;
use crate::error::Result;
use crate::messages::store::{AgentMessage, AgentMessageStore, NewAgentMessage};

/// Channel a process's messages are streamed on.
pub fn message_channel(process_id: &str) -> String {
    format!("process:{process_id}:messages")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Streaming Decorator
// ═══════════════════════════════════════════════════════════════════════════════

/// Publishes each stored message on the process's pub/sub channel so live
/// subscribers (a UI tailing an agent session) see it as it lands.
///
/// Pub/sub has no backlog: subscribers that connect late replay the
/// transcript through `get` instead.
pub struct StreamingMessageStore {
    inner: Arc<dyn AgentMessageStore>,
    publisher: Arc<dyn StreamPublisher>,
}

impl StreamingMessageStore {
    pub fn new(inner: Arc<dyn AgentMessageStore>, publisher: Arc<dyn StreamPublisher>) -> Self {
        Self { inner, publisher }
    }
}

#[async_trait]
impl AgentMessageStore for StreamingMessageStore {
    #[instrument(skip(self, message), fields(turn = message.turn))]
    async fn append(&self, process_id: &str, message: NewAgentMessage) -> Result<Uuid> {
        let stored = message.clone().into_message(Uuid::nil());
        let id = self.inner.append(process_id, message).await?;
        let stored = AgentMessage { id, ..stored };

        let channel = message_channel(process_id);
        match serde_json::to_value(&stored) {
            Ok(payload) => match self.publisher.publish(&channel, &payload).await {
                Ok(()) => {
                    counter!("chronicle_notifications_total", "sink" => "stream").increment(1);
                    debug!(%channel, %id, "message streamed");
                }
                Err(error) => {
                    counter!("chronicle_notifications_failed_total", "sink" => "stream")
                        .increment(1);
                    warn!(%channel, %id, %error, "message publish failed; message remains stored");
                }
            },
            Err(error) => {
                warn!(%channel, %id, %error, "message not streamable as JSON");
            }
        }

        Ok(id)
    }

    async fn get(&self, process_id: &str) -> Result<Vec<AgentMessage>> {
        self.inner.get(process_id).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Webhook Decorator
// ═══════════════════════════════════════════════════════════════════════════════

/// Forwards each stored message to a webhook endpoint, fire-and-forget.
pub struct WebhookMessageStore {
    inner: Arc<dyn AgentMessageStore>,
    client: reqwest::Client,
    url: String,
}

impl WebhookMessageStore {
    pub fn new(
        inner: Arc<dyn AgentMessageStore>,
        client: reqwest::Client,
        url: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AgentMessageStore for WebhookMessageStore {
    #[instrument(skip(self, message), fields(turn = message.turn))]
    async fn append(&self, process_id: &str, message: NewAgentMessage) -> Result<Uuid> {
        let stored = message.clone().into_message(Uuid::nil());
        let id = self.inner.append(process_id, message).await?;
        let stored = AgentMessage { id, ..stored };

        let delivery = self
            .client
            .post(&self.url)
            .json(&stored)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match delivery {
            Ok(_) => {
                counter!("chronicle_notifications_total", "sink" => "message_webhook")
                    .increment(1);
            }
            Err(error) => {
                counter!("chronicle_notifications_failed_total", "sink" => "message_webhook")
                    .increment(1);
                warn!(
                    %id,
                    url = %self.url,
                    %error,
                    "message webhook delivery failed; message remains stored"
                );
            }
        }

        Ok(id)
    }

    async fn get(&self, process_id: &str) -> Result<Vec<AgentMessage>> {
        self.inner.get(process_id).await
    }
}
