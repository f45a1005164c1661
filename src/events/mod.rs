//! The process ledger: domain events, their wire form, and the stores that
//! hold them.

pub mod codec;
pub mod event;
pub mod notify;
pub mod postgres;
pub mod store;

pub use codec::{decode, encode, EventRecord};
pub use event::{
    CodingAgentRequested, DocumentationGenerated, DocumentationMode, DocumentationPromptsGenerated,
    DomainEvent, EventKind, IssueRef, IssueResolutionCompleted, IssueResolutionFailed,
    IssueResolutionStarted, NotionTaskSynced, ProcessStatus, PullRequestRef, RepositoryConnected,
    RepositoryConnectionFailed, RepositoryIndexed, RepositoryIndexingFailed,
    RepositoryIndexingRequested, TokenUsage, TokenUsageRecorded,
};
pub use notify::{QueueEventStore, WebhookEventStore};
pub use postgres::PgEventStore;
pub use store::{Criteria, EventStore, InMemoryEventStore};
