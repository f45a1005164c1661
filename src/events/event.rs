//! Domain events recorded against a resolution process.
//!
//! Every concrete event carries the `process_id` it belongs to and the UTC
//! instant it occurred. The set of variants is closed so deserialization and
//! dispatch can be exhaustive; adding a variant without updating every match
//! site fails to build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::{KnowledgeBase, SupportedIssueTracker};

// ═══════════════════════════════════════════════════════════════════════════════
// Nested Payloads
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference to the issue a process is resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub tracker: SupportedIssueTracker,
    pub key: String,
    pub title: String,
    pub body: String,
}

/// Reference to a pull request produced by a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    pub branch: String,
}

/// Token accounting for one coding-agent invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub agent: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// How documentation prompts were generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentationMode {
    /// Regenerate documentation for the whole repository
    Complete,
    /// Regenerate only for files changed since the previous knowledge-base version
    Incremental,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event Payloads
// ═══════════════════════════════════════════════════════════════════════════════

/// Event: a repository was connected and a process opened for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConnected {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub repository_url: String,
    pub default_branch: String,
}

/// Event: connecting a repository failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConnectionFailed {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub error_type: String,
    pub message: String,
}

/// Event: indexing of a connected repository was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryIndexingRequested {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub knowledge_base: KnowledgeBase,
}

/// Event: a repository finished indexing into a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryIndexed {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub knowledge_base: KnowledgeBase,
}

/// Event: indexing failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryIndexingFailed {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub error_type: String,
    pub message: String,
}

/// Event: an issue-resolution attempt started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResolutionStarted {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub issue: IssueRef,
}

/// Event: an issue-resolution attempt completed with a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResolutionCompleted {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub pull_request: PullRequestRef,
}

/// Event: an issue-resolution attempt failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResolutionFailed {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub error_type: String,
    pub message: String,
}

/// Event: documentation prompts were generated for a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationPromptsGenerated {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub mode: DocumentationMode,
    pub prompt_count: u32,
}

/// Event: documentation was generated and (optionally) proposed as a PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationGenerated {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub pull_request: Option<PullRequestRef>,
}

/// Event: a coding agent was asked to act on the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingAgentRequested {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub agent: String,
    pub model: String,
    pub instructions: String,
}

/// Event: token usage was recorded for an agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageRecorded {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub usage: TokenUsage,
}

/// Event: a Notion task mirroring this process was synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotionTaskSynced {
    pub process_id: String,
    pub occurred_at: DateTime<Utc>,
    pub page_id: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event Enumeration
// ═══════════════════════════════════════════════════════════════════════════════

/// All domain events in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    RepositoryConnected(RepositoryConnected),
    RepositoryConnectionFailed(RepositoryConnectionFailed),
    RepositoryIndexingRequested(RepositoryIndexingRequested),
    RepositoryIndexed(RepositoryIndexed),
    RepositoryIndexingFailed(RepositoryIndexingFailed),
    IssueResolutionStarted(IssueResolutionStarted),
    IssueResolutionCompleted(IssueResolutionCompleted),
    IssueResolutionFailed(IssueResolutionFailed),
    DocumentationPromptsGenerated(DocumentationPromptsGenerated),
    DocumentationGenerated(DocumentationGenerated),
    CodingAgentRequested(CodingAgentRequested),
    TokenUsageRecorded(TokenUsageRecorded),
    NotionTaskSynced(NotionTaskSynced),
}

/// Fieldless discriminator for [`DomainEvent`], used as the durable
/// `event_type` tag and as the type selector for `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    RepositoryConnected,
    RepositoryConnectionFailed,
    RepositoryIndexingRequested,
    RepositoryIndexed,
    RepositoryIndexingFailed,
    IssueResolutionStarted,
    IssueResolutionCompleted,
    IssueResolutionFailed,
    DocumentationPromptsGenerated,
    DocumentationGenerated,
    CodingAgentRequested,
    TokenUsageRecorded,
    NotionTaskSynced,
}

impl EventKind {
    /// The durable string tag written to the `event_type` column.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::RepositoryConnected => "repository_connected",
            Self::RepositoryConnectionFailed => "repository_connection_failed",
            Self::RepositoryIndexingRequested => "repository_indexing_requested",
            Self::RepositoryIndexed => "repository_indexed",
            Self::RepositoryIndexingFailed => "repository_indexing_failed",
            Self::IssueResolutionStarted => "issue_resolution_started",
            Self::IssueResolutionCompleted => "issue_resolution_completed",
            Self::IssueResolutionFailed => "issue_resolution_failed",
            Self::DocumentationPromptsGenerated => "documentation_prompts_generated",
            Self::DocumentationGenerated => "documentation_generated",
            Self::CodingAgentRequested => "coding_agent_requested",
            Self::TokenUsageRecorded => "token_usage_recorded",
            Self::NotionTaskSynced => "notion_task_synced",
        }
    }

    /// Resolve a durable tag back to a kind. `None` means the tag is not part
    /// of the closed set and the record cannot be deserialized.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "repository_connected" => Self::RepositoryConnected,
            "repository_connection_failed" => Self::RepositoryConnectionFailed,
            "repository_indexing_requested" => Self::RepositoryIndexingRequested,
            "repository_indexed" => Self::RepositoryIndexed,
            "repository_indexing_failed" => Self::RepositoryIndexingFailed,
            "issue_resolution_started" => Self::IssueResolutionStarted,
            "issue_resolution_completed" => Self::IssueResolutionCompleted,
            "issue_resolution_failed" => Self::IssueResolutionFailed,
            "documentation_prompts_generated" => Self::DocumentationPromptsGenerated,
            "documentation_generated" => Self::DocumentationGenerated,
            "coding_agent_requested" => Self::CodingAgentRequested,
            "token_usage_recorded" => Self::TokenUsageRecorded,
            "notion_task_synced" => Self::NotionTaskSynced,
            _ => return None,
        })
    }

    /// Every kind in the closed set, for exhaustiveness checks in tests.
    pub const ALL: [EventKind; 13] = [
        Self::RepositoryConnected,
        Self::RepositoryConnectionFailed,
        Self::RepositoryIndexingRequested,
        Self::RepositoryIndexed,
        Self::RepositoryIndexingFailed,
        Self::IssueResolutionStarted,
        Self::IssueResolutionCompleted,
        Self::IssueResolutionFailed,
        Self::DocumentationPromptsGenerated,
        Self::DocumentationGenerated,
        Self::CodingAgentRequested,
        Self::TokenUsageRecorded,
        Self::NotionTaskSynced,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl DomainEvent {
    /// The discriminator for this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::RepositoryConnected(_) => EventKind::RepositoryConnected,
            Self::RepositoryConnectionFailed(_) => EventKind::RepositoryConnectionFailed,
            Self::RepositoryIndexingRequested(_) => EventKind::RepositoryIndexingRequested,
            Self::RepositoryIndexed(_) => EventKind::RepositoryIndexed,
            Self::RepositoryIndexingFailed(_) => EventKind::RepositoryIndexingFailed,
            Self::IssueResolutionStarted(_) => EventKind::IssueResolutionStarted,
            Self::IssueResolutionCompleted(_) => EventKind::IssueResolutionCompleted,
            Self::IssueResolutionFailed(_) => EventKind::IssueResolutionFailed,
            Self::DocumentationPromptsGenerated(_) => EventKind::DocumentationPromptsGenerated,
            Self::DocumentationGenerated(_) => EventKind::DocumentationGenerated,
            Self::CodingAgentRequested(_) => EventKind::CodingAgentRequested,
            Self::TokenUsageRecorded(_) => EventKind::TokenUsageRecorded,
            Self::NotionTaskSynced(_) => EventKind::NotionTaskSynced,
        }
    }

    /// The process this event belongs to.
    pub fn process_id(&self) -> &str {
        match self {
            Self::RepositoryConnected(e) => &e.process_id,
            Self::RepositoryConnectionFailed(e) => &e.process_id,
            Self::RepositoryIndexingRequested(e) => &e.process_id,
            Self::RepositoryIndexed(e) => &e.process_id,
            Self::RepositoryIndexingFailed(e) => &e.process_id,
            Self::IssueResolutionStarted(e) => &e.process_id,
            Self::IssueResolutionCompleted(e) => &e.process_id,
            Self::IssueResolutionFailed(e) => &e.process_id,
            Self::DocumentationPromptsGenerated(e) => &e.process_id,
            Self::DocumentationGenerated(e) => &e.process_id,
            Self::CodingAgentRequested(e) => &e.process_id,
            Self::TokenUsageRecorded(e) => &e.process_id,
            Self::NotionTaskSynced(e) => &e.process_id,
        }
    }

    /// When the event occurred.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::RepositoryConnected(e) => e.occurred_at,
            Self::RepositoryConnectionFailed(e) => e.occurred_at,
            Self::RepositoryIndexingRequested(e) => e.occurred_at,
            Self::RepositoryIndexed(e) => e.occurred_at,
            Self::RepositoryIndexingFailed(e) => e.occurred_at,
            Self::IssueResolutionStarted(e) => e.occurred_at,
            Self::IssueResolutionCompleted(e) => e.occurred_at,
            Self::IssueResolutionFailed(e) => e.occurred_at,
            Self::DocumentationPromptsGenerated(e) => e.occurred_at,
            Self::DocumentationGenerated(e) => e.occurred_at,
            Self::CodingAgentRequested(e) => e.occurred_at,
            Self::TokenUsageRecorded(e) => e.occurred_at,
            Self::NotionTaskSynced(e) => e.occurred_at,
        }
    }

    /// Whether this event closes its process. A terminal process receives no
    /// further automatic progress and is skipped by the recovery sweep.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RepositoryConnectionFailed(_)
                | Self::RepositoryIndexed(_)
                | Self::RepositoryIndexingFailed(_)
                | Self::IssueResolutionCompleted(_)
                | Self::IssueResolutionFailed(_)
                | Self::DocumentationGenerated(_)
        )
    }

    /// Whether this event marks the beginning of a unit of work whose age the
    /// recovery sweep measures staleness against.
    pub const fn is_start_like(&self) -> bool {
        matches!(
            self,
            Self::RepositoryConnected(_) | Self::RepositoryIndexingRequested(_)
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Derived Process Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Status of a process, derived from its ordered event history.
///
/// A process *is* its events; no status row exists anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Open,
    Succeeded,
    Failed,
}

impl ProcessStatus {
    /// Reduce an ordered event history to the current status.
    pub fn derive(history: &[DomainEvent]) -> Self {
        match history.last() {
            None => Self::Open,
            Some(last) if !last.is_terminal() => Self::Open,
            Some(last) => match last {
                DomainEvent::RepositoryIndexed(_)
                | DomainEvent::IssueResolutionCompleted(_)
                | DomainEvent::DocumentationGenerated(_) => Self::Succeeded,
                _ => Self::Failed,
            },
        }
    }
}
