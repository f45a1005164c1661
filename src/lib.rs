//! Chronicle: an event-sourced ledger for AI issue-resolution processes.
//!
//! Every state change in a resolution process is recorded as an immutable
//! domain event in an append-only, per-process stream. Process state is
//! never stored; it is derived by replaying the stream. On top of the ledger
//! sit notification decorators (webhook, queue, pub/sub streaming), a
//! per-process agent message transcript, and a recovery sweep that
//! force-closes processes abandoned mid-flight.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chronicle_core::events::{DomainEvent, EventStore, InMemoryEventStore, RepositoryConnected};
//!
//! # async fn example() -> chronicle_core::Result<()> {
//! let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
//! store
//!     .append(
//!         "proc-1",
//!         &[DomainEvent::RepositoryConnected(RepositoryConnected {
//!             process_id: "proc-1".to_string(),
//!             occurred_at: chrono::Utc::now(),
//!             repository_url: "https://github.com/acme/widget".to_string(),
//!             default_branch: "main".to_string(),
//!         })],
//!     )
//!     .await?;
//! let history = store.get("proc-1").await?;
//! assert_eq!(history.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod collaborators;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod recovery;
pub mod telemetry;

pub use config::Config;
pub use error::{ChronicleError, Result};

/// Convenience imports for embedding applications.
pub mod prelude {
    pub use crate::collaborators::{Clock, QueuePublisher, StreamPublisher, SystemClock};
    pub use crate::compose::{build_event_store, build_message_store};
    pub use crate::config::Config;
    pub use crate::error::{ChronicleError, Result};
    pub use crate::events::{
        DomainEvent, EventKind, EventRecord, EventStore, InMemoryEventStore, PgEventStore,
        ProcessStatus,
    };
    pub use crate::messages::{
        AgentMessage, AgentMessageStore, InMemoryMessageStore, NewAgentMessage, PgMessageStore,
    };
    pub use crate::recovery::{RecoverySweep, SweepReport};
}
