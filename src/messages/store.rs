//! Agent message store contract and in-memory implementation.
//!
//! Agent messages are the raw transcript of coding-agent turns within a
//! process. They are deliberately schemaless: the payload is opaque JSON and
//! the `turn` counter is caller-supplied, not assigned by the store. The
//! store never validates turn density or uniqueness.

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;

/// A stored agent message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub id: Uuid,
    pub message_type: String,
    pub turn: i32,
    pub agent: String,
    pub model: String,
    pub payload: serde_json::Value,
}

/// An agent message before persistence. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgentMessage {
    pub message_type: String,
    pub turn: i32,
    pub agent: String,
    pub model: String,
    pub payload: serde_json::Value,
}

impl NewAgentMessage {
    pub(crate) fn into_message(self, id: Uuid) -> AgentMessage {
        AgentMessage {
            id,
            message_type: self.message_type,
            turn: self.turn,
            agent: self.agent,
            model: self.model,
            payload: self.payload,
        }
    }
}

/// Per-process transcript of agent messages.
#[async_trait]
pub trait AgentMessageStore: Send + Sync {
    /// Persist `message` under `process_id` and return its generated id.
    async fn append(&self, process_id: &str, message: NewAgentMessage) -> Result<Uuid>;

    /// All messages for `process_id`, ordered by ascending turn. Messages
    /// sharing a turn keep their insertion order. Unknown process ids yield
    /// an empty vec.
    async fn get(&self, process_id: &str) -> Result<Vec<AgentMessage>>;
}

/// In-memory message store keyed by process id.
#[derive(Default)]
pub struct InMemoryMessageStore {
    transcripts: DashMap<String, Vec<AgentMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentMessageStore for InMemoryMessageStore {
    #[instrument(skip(self, message), fields(turn = message.turn))]
    async fn append(&self, process_id: &str, message: NewAgentMessage) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.transcripts
            .entry(process_id.to_string())
            .or_default()
            .push(message.into_message(id));
        counter!("chronicle_messages_appended_total", "store" => "memory").increment(1);
        debug!(process_id, %id, "agent message appended");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, process_id: &str) -> Result<Vec<AgentMessage>> {
        let mut messages = self
            .transcripts
            .get(process_id)
            .map(|t| t.value().clone())
            .unwrap_or_default();
        // Stable sort keeps insertion order within a turn.
        messages.sort_by_key(|m| m.turn);
        Ok(messages)
    }
}
