//! PostgreSQL-backed agent message store.

use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::messages::store::{AgentMessage, AgentMessageStore, NewAgentMessage};

/// Message store backed by the `agent_message_store` table.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentMessageStore for PgMessageStore {
    #[instrument(skip(self, message), fields(turn = message.turn))]
    async fn append(&self, process_id: &str, message: NewAgentMessage) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO agent_message_store
                (message_id, process_id, message_type, turn, agent, model, message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(process_id)
        .bind(&message.message_type)
        .bind(message.turn)
        .bind(&message.agent)
        .bind(&message.model)
        .bind(&message.payload)
        .execute(&self.pool)
        .await?;

        counter!("chronicle_messages_appended_total", "store" => "postgres").increment(1);
        debug!(process_id, %id, "agent message appended");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, process_id: &str) -> Result<Vec<AgentMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT message_id, message_type, turn, agent, model, message
            FROM agent_message_store
            WHERE process_id = $1
            ORDER BY turn ASC, created_at ASC
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    message_id: Uuid,
    message_type: String,
    turn: i32,
    agent: String,
    model: String,
    message: Value,
}

impl MessageRow {
    fn into_message(self) -> AgentMessage {
        AgentMessage {
            id: self.message_id,
            message_type: self.message_type,
            turn: self.turn,
            agent: self.agent,
            model: self.model,
            payload: self.message,
        }
    }
}
