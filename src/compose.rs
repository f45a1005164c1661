//! Config-driven assembly of store stacks.
//!
//! The builders here turn a base store plus configuration into the decorated
//! store the application actually uses. Conflicting notification targets are
//! rejected here, at construction, rather than surfacing as surprising
//! runtime behavior.

use std::sync::Arc;

use crate::collaborators::{QueuePublisher, RedisQueuePublisher, RedisStreamPublisher, StreamPublisher};
use crate::config::{Config, MessagesConfig, NotificationsConfig};
use crate::error::{ChronicleError, Result};
use crate::events::{EventStore, QueueEventStore, WebhookEventStore};
use crate::messages::{AgentMessageStore, StreamingMessageStore, WebhookMessageStore};

fn webhook_client(config: &NotificationsConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.webhook_timeout)
        .build()
        .map_err(|e| ChronicleError::Configuration(format!("webhook client: {e}")))
}

/// Wrap `base` with the notification decorator the configuration selects.
///
/// With neither target configured the base store is returned untouched. With
/// both configured the configuration is rejected: the two targets carry
/// different delivery contracts and silently stacking them would make append
/// failure semantics depend on decorator order.
pub fn build_event_store(
    base: Arc<dyn EventStore>,
    config: &Config,
) -> Result<Arc<dyn EventStore>> {
    let notifications = &config.notifications;
    match (&notifications.webhook_url, &notifications.queue) {
        (Some(_), Some(_)) => Err(ChronicleError::Configuration(
            "notifications.webhook_url and notifications.queue are mutually exclusive".to_string(),
        )),
        (Some(url), None) => {
            let client = webhook_client(notifications)?;
            Ok(Arc::new(WebhookEventStore::new(base, client, url.clone())))
        }
        (None, Some(queue)) => {
            let publisher: Arc<dyn QueuePublisher> =
                Arc::new(RedisQueuePublisher::from_url(&config.redis.url)?);
            Ok(Arc::new(QueueEventStore::new(base, publisher, queue.clone())))
        }
        (None, None) => Ok(base),
    }
}

/// Wrap `base` with the message notification decorator the configuration
/// selects. Webhook forwarding and pub/sub streaming are mutually exclusive.
pub fn build_message_store(
    base: Arc<dyn AgentMessageStore>,
    config: &Config,
) -> Result<Arc<dyn AgentMessageStore>> {
    let messages = &config.messages;
    match (&messages.webhook_url, messages.streaming) {
        (Some(_), true) => Err(ChronicleError::Configuration(
            "messages.webhook_url and messages.streaming are mutually exclusive".to_string(),
        )),
        (Some(url), false) => {
            let client = webhook_client(&config.notifications)?;
            Ok(Arc::new(WebhookMessageStore::new(base, client, url.clone())))
        }
        (None, true) => {
            let publisher: Arc<dyn StreamPublisher> =
                Arc::new(RedisStreamPublisher::from_url(&config.redis.url)?);
            Ok(Arc::new(StreamingMessageStore::new(base, publisher)))
        }
        (None, false) => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ObservabilityConfig, RecoveryConfig, RedisConfig};
    use crate::events::InMemoryEventStore;
    use crate::messages::InMemoryMessageStore;

    fn config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/chronicle".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            redis: RedisConfig::default(),
            notifications: NotificationsConfig::default(),
            messages: MessagesConfig::default(),
            recovery: RecoveryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn test_both_event_targets_rejected() {
        let mut cfg = config();
        cfg.notifications.webhook_url = Some("https://example.com/hook".to_string());
        cfg.notifications.queue = Some("events".to_string());

        let err = build_event_store(Arc::new(InMemoryEventStore::new()), &cfg)
            .err()
            .unwrap();
        assert!(matches!(err, ChronicleError::Configuration(_)));
    }

    #[test]
    fn test_both_message_targets_rejected() {
        let mut cfg = config();
        cfg.messages.webhook_url = Some("https://example.com/hook".to_string());
        cfg.messages.streaming = true;

        let err = build_message_store(Arc::new(InMemoryMessageStore::new()), &cfg)
            .err()
            .unwrap();
        assert!(matches!(err, ChronicleError::Configuration(_)));
    }

    #[test]
    fn test_silent_config_returns_base_stores() {
        let cfg = config();
        assert!(build_event_store(Arc::new(InMemoryEventStore::new()), &cfg).is_ok());
        assert!(build_message_store(Arc::new(InMemoryMessageStore::new()), &cfg).is_ok());
    }
}
