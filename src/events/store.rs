//! The event store contract and its in-memory reference implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ChronicleError, Result};
use crate::events::codec::{self, EventRecord};
use crate::events::event::{DomainEvent, EventKind};

/// Criteria for `find`: the record's `data` document must contain every
/// key/value pair, with JSONB containment semantics (nested objects match on
/// the keys the criteria names and may carry extra fields).
pub type Criteria = serde_json::Map<String, Value>;

/// Append-only, per-process ordered log of domain events.
///
/// A process is implicitly created by its first event; there is no separate
/// process row anywhere. Events are write-once: the contract exposes no
/// update or delete operation.
///
/// Callers must uphold single-writer-per-process-id: two concurrent appends
/// to the *same* process id race on position assignment in the relational
/// implementation. Appends to distinct process ids are fully independent.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` to `process_id`'s stream, in call order. Each event
    /// receives the next dense 1-based position. Returns the persisted
    /// records (including generated event ids and assigned positions).
    ///
    /// No multi-event atomicity is guaranteed: on failure, earlier events of
    /// the same call may already be persisted.
    async fn append(&self, process_id: &str, events: &[DomainEvent]) -> Result<Vec<EventRecord>>;

    /// All events for `process_id` in ascending position order. An unknown
    /// process id yields an empty vec, not an error.
    async fn get(&self, process_id: &str) -> Result<Vec<DomainEvent>>;

    /// Events of concrete type `kind` whose `data` contains every `criteria`
    /// pair, ordered by occurrence time. No matches is an empty vec.
    async fn find(&self, criteria: &Criteria, kind: EventKind) -> Result<Vec<DomainEvent>>;
}

/// Verify each fetched record carries the requested tag, then decode.
///
/// The tag check is a defensive invariant: a record that reached this point
/// with a different tag means the store returned rows the query should not
/// have matched, i.e. store or schema corruption.
pub(crate) fn decode_as(records: &[EventRecord], kind: EventKind) -> Result<Vec<DomainEvent>> {
    records
        .iter()
        .map(|record| {
            if record.event_type != kind.tag() {
                return Err(ChronicleError::TypeMismatch {
                    expected: kind.tag(),
                    actual: record.event_type.clone(),
                });
            }
            codec::decode(record)
        })
        .collect()
}

/// True when `data` contains every criteria pair.
///
/// Mirrors Postgres JSONB containment (`@>`) so both backends agree: objects
/// match when the criteria's keys are a subset and their values are contained
/// recursively, arrays match when every criteria element is contained by some
/// stored element, scalars match on equality.
pub(crate) fn matches_criteria(data: &Value, criteria: &Criteria) -> bool {
    criteria.iter().all(|(key, expected)| {
        data.get(key)
            .is_some_and(|actual| contains(actual, expected))
    })
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| contains(a, value))),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|value| actual.iter().any(|a| contains(a, value))),
        (actual, expected) => actual == expected,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Implementation
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory event store keyed by process id.
///
/// Used by tests and for ephemeral local execution. Per-stream appends are
/// serialized by the map's shard lock, so positions stay dense even under
/// concurrent use.
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: DashMap<String, Vec<EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw record, bypassing encoding and position assignment.
    ///
    /// Escape hatch for tests that need to model historical or corrupted
    /// rows; production code appends domain events.
    #[doc(hidden)]
    pub fn insert_record(&self, record: EventRecord) {
        self.streams
            .entry(record.activity_id.clone())
            .or_default()
            .push(record);
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, process_id: &str, events: &[DomainEvent]) -> Result<Vec<EventRecord>> {
        let mut stream = self.streams.entry(process_id.to_string()).or_default();
        let mut appended = Vec::with_capacity(events.len());

        for event in events {
            let next_position = stream.last().map_or(0, |r| r.position) + 1;
            let record = codec::encode(process_id, event, next_position)?;
            stream.push(record.clone());
            appended.push(record);
            counter!("chronicle_events_appended_total", "store" => "memory").increment(1);
        }

        debug!(process_id, appended = appended.len(), "events appended");
        Ok(appended)
    }

    #[instrument(skip(self))]
    async fn get(&self, process_id: &str) -> Result<Vec<DomainEvent>> {
        match self.streams.get(process_id) {
            Some(stream) => stream.iter().map(codec::decode).collect(),
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, criteria))]
    async fn find(&self, criteria: &Criteria, kind: EventKind) -> Result<Vec<DomainEvent>> {
        let mut matched: Vec<EventRecord> = self
            .streams
            .iter()
            .flat_map(|stream| {
                stream
                    .value()
                    .iter()
                    .filter(|r| r.event_type == kind.tag() && matches_criteria(&r.data, criteria))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        matched.sort_by_key(|r| r.occurred_at);

        decode_as(&matched, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SupportedIssueTracker;
    use crate::events::event::{
        IssueRef, IssueResolutionFailed, IssueResolutionStarted, RepositoryConnected,
        RepositoryIndexingRequested,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn connected(process_id: &str) -> DomainEvent {
        DomainEvent::RepositoryConnected(RepositoryConnected {
            process_id: process_id.to_string(),
            occurred_at: Utc::now(),
            repository_url: "https://github.com/acme/widget".to_string(),
            default_branch: "main".to_string(),
        })
    }

    fn indexing_requested(process_id: &str) -> DomainEvent {
        DomainEvent::RepositoryIndexingRequested(RepositoryIndexingRequested {
            process_id: process_id.to_string(),
            occurred_at: Utc::now(),
            knowledge_base: crate::collaborators::KnowledgeBase::new("kb-1", 1),
        })
    }

    #[tokio::test]
    async fn test_positions_are_dense_and_one_based() {
        let store = InMemoryEventStore::new();

        let first = store
            .append("p1", &[connected("p1"), indexing_requested("p1")])
            .await
            .unwrap();
        let second = store.append("p1", &[indexing_requested("p1")]).await.unwrap();

        let positions: Vec<i64> = first
            .iter()
            .chain(second.iter())
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let history = store.get("p1").await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_get_unknown_process_is_empty_not_error() {
        let store = InMemoryEventStore::new();
        let history = store.get("nope").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_streams_do_not_interleave() {
        let store = std::sync::Arc::new(InMemoryEventStore::new());

        let a = store.clone();
        let b = store.clone();
        let task_a = tokio::spawn(async move {
            for _ in 0..10 {
                a.append("pa", &[connected("pa")]).await.unwrap();
            }
        });
        let task_b = tokio::spawn(async move {
            for _ in 0..10 {
                b.append("pb", &[connected("pb")]).await.unwrap();
            }
        });
        task_a.await.unwrap();
        task_b.await.unwrap();

        for process_id in ["pa", "pb"] {
            let stream = store.streams.get(process_id).unwrap();
            let positions: Vec<i64> = stream.iter().map(|r| r.position).collect();
            assert_eq!(positions, (1..=10).collect::<Vec<i64>>());
        }
    }

    #[tokio::test]
    async fn test_find_filters_by_criteria_and_kind() {
        let store = InMemoryEventStore::new();
        store.append("p1", &[connected("p1")]).await.unwrap();
        store.append("p2", &[connected("p2")]).await.unwrap();
        store
            .append(
                "p2",
                &[DomainEvent::IssueResolutionFailed(IssueResolutionFailed {
                    process_id: "p2".to_string(),
                    occurred_at: Utc::now(),
                    error_type: "timeout".to_string(),
                    message: "stalled".to_string(),
                })],
            )
            .await
            .unwrap();

        let mut criteria = Criteria::new();
        criteria.insert("process_id".to_string(), Value::String("p2".to_string()));
        let found = store
            .find(&criteria, EventKind::RepositoryConnected)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].process_id(), "p2");

        let all_connected = store
            .find(&Criteria::new(), EventKind::RepositoryConnected)
            .await
            .unwrap();
        assert_eq!(all_connected.len(), 2);

        let none = store
            .find(&criteria, EventKind::TokenUsageRecorded)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_criteria_use_containment_not_exact_equality() {
        let store = InMemoryEventStore::new();
        store
            .append(
                "p1",
                &[DomainEvent::IssueResolutionStarted(IssueResolutionStarted {
                    process_id: "p1".to_string(),
                    occurred_at: Utc::now(),
                    issue: IssueRef {
                        tracker: SupportedIssueTracker::Github,
                        key: "#18".to_string(),
                        title: "Widget panics on empty input".to_string(),
                        body: "Steps to reproduce...".to_string(),
                    },
                })],
            )
            .await
            .unwrap();

        // A proper subset of the stored `issue` object still matches, as it
        // would under JSONB containment on the relational backend.
        let mut criteria = Criteria::new();
        criteria.insert("issue".to_string(), serde_json::json!({ "key": "#18" }));
        let found = store
            .find(&criteria, EventKind::IssueResolutionStarted)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].process_id(), "p1");

        // A nested value that differs does not.
        let mut criteria = Criteria::new();
        criteria.insert("issue".to_string(), serde_json::json!({ "key": "#99" }));
        let found = store
            .find(&criteria, EventKind::IssueResolutionStarted)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_containment_descends_objects_and_arrays() {
        let data = serde_json::json!({
            "issue": { "key": "#18", "title": "Widget panics", "labels": ["bug", "p1"] },
            "attempt": 2,
        });

        let mut criteria = Criteria::new();
        criteria.insert("issue".to_string(), serde_json::json!({ "labels": ["bug"] }));
        assert!(matches_criteria(&data, &criteria));

        criteria.insert("attempt".to_string(), serde_json::json!(2));
        assert!(matches_criteria(&data, &criteria));

        let mut criteria = Criteria::new();
        criteria.insert("issue".to_string(), serde_json::json!({ "labels": ["docs"] }));
        assert!(!matches_criteria(&data, &criteria));

        // Scalars never match partially.
        let mut criteria = Criteria::new();
        criteria.insert("attempt".to_string(), serde_json::json!("2"));
        assert!(!matches_criteria(&data, &criteria));
    }

    #[test]
    fn test_decode_as_rejects_mismatched_tag() {
        // Models a corrupted store: a row fetched for one type carrying
        // another type's tag.
        let record = EventRecord {
            event_id: Uuid::new_v4(),
            activity_id: "p1".to_string(),
            position: 1,
            event_type: "token_usage_recorded".to_string(),
            data: serde_json::json!({}),
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        };

        let err = decode_as(&[record], EventKind::RepositoryConnected).unwrap_err();
        match err {
            ChronicleError::TypeMismatch { expected, actual } => {
                assert_eq!(expected, "repository_connected");
                assert_eq!(actual, "token_usage_recorded");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupted_record_surfaces_deserialization_error() {
        let store = InMemoryEventStore::new();
        store.insert_record(EventRecord {
            event_id: Uuid::new_v4(),
            activity_id: "p1".to_string(),
            position: 1,
            event_type: "mystery_event".to_string(),
            data: serde_json::json!({}),
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        });

        let err = store.get("p1").await.unwrap_err();
        assert!(matches!(err, ChronicleError::Deserialization { .. }));
    }
}
