//! Serialization registry: [`DomainEvent`] <-> [`EventRecord`].
//!
//! The registry owns the durable discriminator mapping. Both directions are
//! exhaustive over the closed event set: encoding matches every variant, and
//! decoding an unrecognized tag is a hard [`ChronicleError::Deserialization`]
//! failure rather than a silent skip, so a process timeline can never be
//! partially reconstructed.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ChronicleError, Result};
use crate::events::event::{DomainEvent, EventKind};

/// Wire and storage form of a domain event.
///
/// `(activity_id, position)` is unique; `position` is a dense 1-based
/// sequence per activity assigned by the store at append time, never by the
/// caller. The same shape is used for the `events_store` row, the webhook
/// POST body, and the queue message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub activity_id: String,
    pub position: i64,
    pub event_type: String,
    pub data: Value,
    /// Free-form envelope metadata, currently unused.
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Encode a domain event into its storage record, assigning a fresh event id.
///
/// `activity_id` is the process the append call is keyed by; `position` is
/// the store-assigned position for that activity.
pub fn encode(activity_id: &str, event: &DomainEvent, position: i64) -> Result<EventRecord> {
    let data = match event {
        DomainEvent::RepositoryConnected(e) => to_data(e),
        DomainEvent::RepositoryConnectionFailed(e) => to_data(e),
        DomainEvent::RepositoryIndexingRequested(e) => to_data(e),
        DomainEvent::RepositoryIndexed(e) => to_data(e),
        DomainEvent::RepositoryIndexingFailed(e) => to_data(e),
        DomainEvent::IssueResolutionStarted(e) => to_data(e),
        DomainEvent::IssueResolutionCompleted(e) => to_data(e),
        DomainEvent::IssueResolutionFailed(e) => to_data(e),
        DomainEvent::DocumentationPromptsGenerated(e) => to_data(e),
        DomainEvent::DocumentationGenerated(e) => to_data(e),
        DomainEvent::CodingAgentRequested(e) => to_data(e),
        DomainEvent::TokenUsageRecorded(e) => to_data(e),
        DomainEvent::NotionTaskSynced(e) => to_data(e),
    }?;

    Ok(EventRecord {
        event_id: Uuid::new_v4(),
        activity_id: activity_id.to_string(),
        position,
        event_type: event.kind().tag().to_string(),
        data,
        metadata: Value::Object(serde_json::Map::new()),
        occurred_at: event.occurred_at(),
    })
}

/// Decode a storage record back into a domain event.
///
/// Fails with [`ChronicleError::Deserialization`] naming the tag if the
/// record's `event_type` is not in the closed set or its payload does not
/// match the variant's shape.
pub fn decode(record: &EventRecord) -> Result<DomainEvent> {
    let kind = EventKind::from_tag(&record.event_type).ok_or_else(|| {
        ChronicleError::deserialization(&record.event_type, "unrecognized event type tag")
    })?;

    let tag = kind.tag();
    Ok(match kind {
        EventKind::RepositoryConnected => {
            DomainEvent::RepositoryConnected(from_data(tag, record.data.clone())?)
        }
        EventKind::RepositoryConnectionFailed => {
            DomainEvent::RepositoryConnectionFailed(from_data(tag, record.data.clone())?)
        }
        EventKind::RepositoryIndexingRequested => {
            DomainEvent::RepositoryIndexingRequested(from_data(tag, record.data.clone())?)
        }
        EventKind::RepositoryIndexed => {
            DomainEvent::RepositoryIndexed(from_data(tag, record.data.clone())?)
        }
        EventKind::RepositoryIndexingFailed => {
            DomainEvent::RepositoryIndexingFailed(from_data(tag, record.data.clone())?)
        }
        EventKind::IssueResolutionStarted => {
            DomainEvent::IssueResolutionStarted(from_data(tag, record.data.clone())?)
        }
        EventKind::IssueResolutionCompleted => {
            DomainEvent::IssueResolutionCompleted(from_data(tag, record.data.clone())?)
        }
        EventKind::IssueResolutionFailed => {
            DomainEvent::IssueResolutionFailed(from_data(tag, record.data.clone())?)
        }
        EventKind::DocumentationPromptsGenerated => {
            // Records persisted before incremental generation existed carry
            // no "mode" field; they were complete-mode generations. The
            // default is applied here, per field, not via serde defaults.
            let mut data = record.data.clone();
            if let Some(obj) = data.as_object_mut() {
                obj.entry("mode")
                    .or_insert_with(|| Value::String("complete".to_string()));
            }
            DomainEvent::DocumentationPromptsGenerated(from_data(tag, data)?)
        }
        EventKind::DocumentationGenerated => {
            DomainEvent::DocumentationGenerated(from_data(tag, record.data.clone())?)
        }
        EventKind::CodingAgentRequested => {
            DomainEvent::CodingAgentRequested(from_data(tag, record.data.clone())?)
        }
        EventKind::TokenUsageRecorded => {
            DomainEvent::TokenUsageRecorded(from_data(tag, record.data.clone())?)
        }
        EventKind::NotionTaskSynced => {
            DomainEvent::NotionTaskSynced(from_data(tag, record.data.clone())?)
        }
    })
}

fn to_data<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| ChronicleError::storage("failed to serialize event payload").with_source(e))
}

fn from_data<T: DeserializeOwned>(tag: &'static str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| ChronicleError::deserialization(tag, e.to_string()))
}
