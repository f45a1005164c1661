//! External collaborator interfaces consumed by the ledger core.
//!
//! Everything here is injected by the embedding application and owned
//! elsewhere: the clock, the queue transport, the pub/sub transport, and the
//! issue tracker. The core never constructs these on its own except for the
//! Redis-backed reference implementations provided for production wiring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the current time.
///
/// Injected so the timeout recovery sweep can be driven by a fixed clock in
/// tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Queue Publisher
// ═══════════════════════════════════════════════════════════════════════════════

/// Publishes a JSON payload to a named durable queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, queue: &str, payload: &serde_json::Value) -> Result<()>;
}

/// Queue publisher backed by a Redis list (`LPUSH`).
pub struct RedisQueuePublisher {
    client: redis::Client,
}

impl RedisQueuePublisher {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl QueuePublisher for RedisQueuePublisher {
    async fn publish(&self, queue: &str, payload: &serde_json::Value) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = payload.to_string();
        let _: () = redis::cmd("LPUSH")
            .arg(queue)
            .arg(body)
            .query_async(&mut conn)
            .await?;
        debug!(queue, "published queue message");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Stream Publisher
// ═══════════════════════════════════════════════════════════════════════════════

/// Publishes a JSON payload on a pub/sub channel.
///
/// No delivery guarantee beyond "subscribers connected at publish time
/// receive it".
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &serde_json::Value) -> Result<()>;
}

/// Stream publisher backed by Redis `PUBLISH`.
pub struct RedisStreamPublisher {
    client: redis::Client,
}

impl RedisStreamPublisher {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl StreamPublisher for RedisStreamPublisher {
    async fn publish(&self, channel: &str, payload: &serde_json::Value) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = payload.to_string();
        let _: () = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(body)
            .query_async(&mut conn)
            .await?;
        debug!(channel, "published stream message");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Issue Tracker
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of issue trackers a process can be driven from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedIssueTracker {
    Github,
    Gitlab,
    Linear,
    Notion,
}

impl SupportedIssueTracker {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Linear => "linear",
            Self::Notion => "notion",
        }
    }
}

/// Narrow interface to the issue tracker that supplies ticket descriptions.
///
/// The ledger itself never calls this; it is defined here so command handlers
/// and the ledger share one contract for the `IssueRef` payloads recorded in
/// resolution events.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Which tracker this implementation talks to.
    fn tracker(&self) -> SupportedIssueTracker;

    /// Fetch the issue identified by `key` (e.g. "ORG-123" or "#42").
    async fn fetch_issue(&self, key: &str) -> Result<crate::events::IssueRef>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Knowledge Base
// ═══════════════════════════════════════════════════════════════════════════════

/// Key into the knowledge repository collaborator: one indexed snapshot of a
/// connected repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub version: i32,
}

impl KnowledgeBase {
    pub fn new(id: impl Into<String>, version: i32) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_tracker_tags_are_exhaustive() {
        let all = [
            SupportedIssueTracker::Github,
            SupportedIssueTracker::Gitlab,
            SupportedIssueTracker::Linear,
            SupportedIssueTracker::Notion,
        ];
        for tracker in all {
            let json = serde_json::to_string(&tracker).unwrap();
            let back: SupportedIssueTracker = serde_json::from_str(&json).unwrap();
            assert_eq!(tracker, back);
            assert_eq!(json.trim_matches('"'), tracker.as_str());
        }
    }

    #[test]
    fn test_knowledge_base_value_semantics() {
        let a = KnowledgeBase::new("kb-1", 2);
        let b = KnowledgeBase::new("kb-1", 2);
        assert_eq!(a, b);
    }
}
