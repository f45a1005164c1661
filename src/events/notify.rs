//! Notification fan-out decorators for the event store.
//!
//! Each decorator wraps an inner store and adds one side effect *after* the
//! inner append succeeds. The stored result is never altered: reads pass
//! straight through, and a failed side effect never rolls back the append.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::collaborators::QueuePublisher;
use crate::error::{ChronicleError, Result};
use crate::events::codec::EventRecord;
use crate::events::event::{DomainEvent, EventKind};
use crate::events::store::{Criteria, EventStore};

// ═══════════════════════════════════════════════════════════════════════════════
// Webhook Forwarder
// ═══════════════════════════════════════════════════════════════════════════════

/// Forwards every appended event record to a webhook endpoint.
///
/// Delivery is fire-and-forget: one POST per event, no retries, and a failed
/// or timed-out POST is logged and swallowed. Webhook consumers reconcile by
/// polling `get`. The HTTP client's timeout bounds how long a slow endpoint
/// can hold up the append path.
pub struct WebhookEventStore {
    inner: Arc<dyn EventStore>,
    client: reqwest::Client,
    url: String,
}

impl WebhookEventStore {
    pub fn new(inner: Arc<dyn EventStore>, client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            inner,
            client,
            url: url.into(),
        }
    }

    async fn forward(&self, record: &EventRecord) {
        let delivery = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match delivery {
            Ok(_) => {
                counter!("chronicle_notifications_total", "sink" => "webhook").increment(1);
                debug!(event_id = %record.event_id, "event forwarded to webhook");
            }
            Err(error) => {
                counter!("chronicle_notifications_failed_total", "sink" => "webhook").increment(1);
                warn!(
                    event_id = %record.event_id,
                    url = %self.url,
                    %error,
                    "webhook delivery failed; event remains appended"
                );
            }
        }
    }
}

#[async_trait]
impl EventStore for WebhookEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, process_id: &str, events: &[DomainEvent]) -> Result<Vec<EventRecord>> {
        let records = self.inner.append(process_id, events).await?;
        for record in &records {
            self.forward(record).await;
        }
        Ok(records)
    }

    async fn get(&self, process_id: &str) -> Result<Vec<DomainEvent>> {
        self.inner.get(process_id).await
    }

    async fn find(&self, criteria: &Criteria, kind: EventKind) -> Result<Vec<DomainEvent>> {
        self.inner.find(criteria, kind).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Queue Publisher
// ═══════════════════════════════════════════════════════════════════════════════

/// Publishes every appended event record to a durable queue.
///
/// Unlike the webhook forwarder, a publish failure surfaces to the caller as
/// [`ChronicleError::NotificationDelivery`] even though the event is already
/// durably appended. Callers must treat that error as a partial-failure
/// state (event recorded, notification missing) and reconcile out of band.
pub struct QueueEventStore {
    inner: Arc<dyn EventStore>,
    publisher: Arc<dyn QueuePublisher>,
    queue: String,
}

impl QueueEventStore {
    pub fn new(
        inner: Arc<dyn EventStore>,
        publisher: Arc<dyn QueuePublisher>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            publisher,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl EventStore for QueueEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, process_id: &str, events: &[DomainEvent]) -> Result<Vec<EventRecord>> {
        let records = self.inner.append(process_id, events).await?;

        for record in &records {
            let payload = serde_json::to_value(record).map_err(|e| {
                ChronicleError::delivery("queue", format!("failed to serialize record: {e}"))
            })?;
            self.publisher
                .publish(&self.queue, &payload)
                .await
                .map_err(|e| {
                    counter!("chronicle_notifications_failed_total", "sink" => "queue")
                        .increment(1);
                    ChronicleError::delivery(
                        format!("queue:{}", self.queue),
                        format!("event {} appended but not published: {e}", record.event_id),
                    )
                })?;
            counter!("chronicle_notifications_total", "sink" => "queue").increment(1);
        }

        Ok(records)
    }

    async fn get(&self, process_id: &str) -> Result<Vec<DomainEvent>> {
        self.inner.get(process_id).await
    }

    async fn find(&self, criteria: &Criteria, kind: EventKind) -> Result<Vec<DomainEvent>> {
        self.inner.find(criteria, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::RepositoryConnected;
    use crate::events::store::InMemoryEventStore;
    use chrono::Utc;
    use tokio::sync::Mutex;

    fn connected(process_id: &str) -> DomainEvent {
        DomainEvent::RepositoryConnected(RepositoryConnected {
            process_id: process_id.to_string(),
            occurred_at: Utc::now(),
            repository_url: "https://github.com/acme/widget".to_string(),
            default_branch: "main".to_string(),
        })
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, serde_json::Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl QueuePublisher for RecordingPublisher {
        async fn publish(&self, queue: &str, payload: &serde_json::Value) -> Result<()> {
            if self.fail {
                return Err(ChronicleError::delivery("queue", "broker unreachable"));
            }
            self.published
                .lock()
                .await
                .push((queue.to_string(), payload.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_queue_decorator_publishes_each_event() {
        let inner = Arc::new(InMemoryEventStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let store = QueueEventStore::new(inner, publisher.clone(), "ledger-events");

        let records = store
            .append("p1", &[connected("p1"), connected("p1")])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|(q, _)| q == "ledger-events"));
        assert_eq!(
            published[0].1.get("event_type").and_then(|v| v.as_str()),
            Some("repository_connected")
        );
    }

    #[tokio::test]
    async fn test_queue_failure_surfaces_but_event_stays_visible() {
        let inner = Arc::new(InMemoryEventStore::new());
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let store = QueueEventStore::new(inner.clone(), publisher, "ledger-events");

        let err = store.append("p1", &[connected("p1")]).await.unwrap_err();
        assert!(matches!(err, ChronicleError::NotificationDelivery { .. }));

        // Partial-failure state: the append itself was durable.
        let history = inner.get("p1").await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
