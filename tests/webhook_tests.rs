//! Webhook delivery behavior, verified against a mock HTTP server.

use std::sync::Arc;

use chrono::Utc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chronicle_core::events::{
    DomainEvent, EventStore, InMemoryEventStore, RepositoryConnected, WebhookEventStore,
};
use chronicle_core::messages::{
    AgentMessageStore, InMemoryMessageStore, NewAgentMessage, WebhookMessageStore,
};

fn connected(process_id: &str) -> DomainEvent {
    DomainEvent::RepositoryConnected(RepositoryConnected {
        process_id: process_id.to_string(),
        occurred_at: Utc::now(),
        repository_url: "https://github.com/acme/widget".to_string(),
        default_branch: "main".to_string(),
    })
}

#[tokio::test]
async fn test_one_post_per_appended_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(serde_json::json!({
            "event_type": "repository_connected"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let store = WebhookEventStore::new(
        Arc::new(InMemoryEventStore::new()),
        reqwest::Client::new(),
        format!("{}/events", server.uri()),
    );

    store
        .append("proc-1", &[connected("proc-1"), connected("proc-1")])
        .await
        .unwrap();
    store.append("proc-2", &[connected("proc-2")]).await.unwrap();
}

#[tokio::test]
async fn test_endpoint_failure_does_not_lose_the_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let inner = Arc::new(InMemoryEventStore::new());
    let store = WebhookEventStore::new(inner.clone(), reqwest::Client::new(), server.uri());

    // Fire-and-forget: the append succeeds and returns the stored record.
    let records = store.append("proc-1", &[connected("proc-1")]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].position, 1);

    let history = inner.get("proc-1").await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_message_webhook_receives_the_stored_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(serde_json::json!({
            "message_type": "assistant",
            "turn": 3,
            "agent": "resolver"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let inner = Arc::new(InMemoryMessageStore::new());
    let store = WebhookMessageStore::new(
        inner.clone(),
        reqwest::Client::new(),
        format!("{}/messages", server.uri()),
    );

    let id = store
        .append(
            "proc-1",
            NewAgentMessage {
                message_type: "assistant".to_string(),
                turn: 3,
                agent: "resolver".to_string(),
                model: "large".to_string(),
                payload: serde_json::json!({ "text": "opening a pull request" }),
            },
        )
        .await
        .unwrap();

    let transcript = inner.get("proc-1").await.unwrap();
    assert_eq!(transcript[0].id, id);
}
