//! Per-process agent message transcripts.

pub mod notify;
pub mod postgres;
pub mod store;

pub use notify::{message_channel, StreamingMessageStore, WebhookMessageStore};
pub use postgres::PgMessageStore;
pub use store::{AgentMessage, AgentMessageStore, InMemoryMessageStore, NewAgentMessage};
