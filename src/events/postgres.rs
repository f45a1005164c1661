//! PostgreSQL-backed event store.
//!
//! One append-only table holds the ledger; see `migrations/` for the schema.
//! Position assignment is a `SELECT MAX` followed by an `INSERT` without an
//! enclosing transaction: the store relies on the documented
//! single-writer-per-process-id invariant rather than defending against
//! concurrent appends to one process id. The `UNIQUE(activity_id, position)`
//! constraint turns a violated invariant into a rejected write instead of a
//! corrupted stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::events::codec::{self, EventRecord};
use crate::events::event::{DomainEvent, EventKind};
use crate::events::store::{decode_as, Criteria, EventStore};

/// Event store backed by the `events_store` table.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a connection pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::ChronicleError::storage("migration failed").with_source(e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn next_position(&self, process_id: &str) -> Result<i64> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) FROM events_store WHERE activity_id = $1",
        )
        .bind(process_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max + 1)
    }

    async fn insert(&self, record: &EventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events_store (event_id, activity_id, position, event_type, data, metadata, occured_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.event_id)
        .bind(&record.activity_id)
        .bind(record.position)
        .bind(&record.event_type)
        .bind(&record.data)
        .bind(&record.metadata)
        .bind(record.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, process_id: &str, events: &[DomainEvent]) -> Result<Vec<EventRecord>> {
        let mut appended = Vec::with_capacity(events.len());

        for event in events {
            let position = self.next_position(process_id).await?;
            let record = codec::encode(process_id, event, position)?;
            self.insert(&record).await?;
            counter!("chronicle_events_appended_total", "store" => "postgres").increment(1);
            appended.push(record);
        }

        debug!(process_id, appended = appended.len(), "events appended");
        Ok(appended)
    }

    #[instrument(skip(self))]
    async fn get(&self, process_id: &str) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, activity_id, position, event_type, data, metadata, occured_at
            FROM events_store
            WHERE activity_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| codec::decode(&row.to_record())).collect()
    }

    #[instrument(skip(self, criteria))]
    async fn find(&self, criteria: &Criteria, kind: EventKind) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, activity_id, position, event_type, data, metadata, occured_at
            FROM events_store
            WHERE event_type = $1 AND data @> $2
            ORDER BY occured_at ASC
            "#,
        )
        .bind(kind.tag())
        .bind(Value::Object(criteria.clone()))
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<EventRecord> = rows.iter().map(EventRow::to_record).collect();
        decode_as(&records, kind)
    }
}

/// Row type for reading events from the database.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    activity_id: String,
    position: i64,
    event_type: String,
    data: Value,
    metadata: Value,
    // Column name kept from the original schema.
    occured_at: DateTime<Utc>,
}

impl EventRow {
    fn to_record(&self) -> EventRecord {
        EventRecord {
            event_id: self.event_id,
            activity_id: self.activity_id.clone(),
            position: self.position,
            event_type: self.event_type.clone(),
            data: self.data.clone(),
            metadata: self.metadata.clone(),
            occurred_at: self.occured_at,
        }
    }
}
