//! Error handling for the Chronicle ledger.
//!
//! This module provides:
//! - The `ChronicleError` taxonomy shared by every store and decorator
//! - Conversions from the underlying driver errors (sqlx, redis, reqwest)
//! - Severity-aware logging with tracing integration
//! - Metrics integration for error tracking

use metrics::counter;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// A specialized Result type for Chronicle operations.
pub type Result<T> = std::result::Result<T, ChronicleError>;

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Expected operational failures (notification delivery)
    Medium,
    /// Data or persistence failures
    High,
    /// Invariant violations that indicate corruption or misconfiguration
    Critical,
}

/// The error taxonomy for the ledger core.
///
/// Each variant corresponds to one failure class callers are expected to
/// handle differently:
/// - `Storage` aborts the triggering append or read
/// - `Deserialization` and `TypeMismatch` abort the read and indicate a
///   corrupted or unrecognized record; they never corrupt other records
/// - `NotificationDelivery` signals a partial failure: the event is durably
///   appended but the queue side effect was not delivered
/// - `Configuration` is raised at construction time only, never at runtime
#[derive(Error, Debug)]
pub enum ChronicleError {
    /// Persistence layer unreachable or a write was rejected.
    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Unknown or malformed event tag encountered while reading a record.
    #[error("cannot deserialize event record with type tag '{tag}': {detail}")]
    Deserialization { tag: String, detail: String },

    /// A record matched `find` criteria but its stored tag does not
    /// correspond to the requested event type.
    #[error("stored event type '{actual}' does not match requested type '{expected}'")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// A notification side effect failed after a successful append.
    #[error("notification delivery to {target} failed: {detail}")]
    NotificationDelivery { target: String, detail: String },

    /// Conflicting store composition detected at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ChronicleError {
    /// Create a storage error with context.
    pub fn storage(context: impl Into<String>) -> Self {
        Self::Storage {
            context: context.into(),
            source: None,
        }
    }

    /// Create a deserialization error for an event type tag.
    pub fn deserialization(tag: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Deserialization {
            tag: tag.into(),
            detail: detail.into(),
        }
    }

    /// Create a notification delivery error.
    pub fn delivery(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NotificationDelivery {
            target: target.into(),
            detail: detail.into(),
        }
    }

    /// Machine-readable error code, stable across releases.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Deserialization { .. } => "DESERIALIZATION_ERROR",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::NotificationDelivery { .. } => "NOTIFICATION_DELIVERY_FAILED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether retrying the same operation can reasonably succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::NotificationDelivery { .. }
        )
    }

    /// Error severity for logging and alerting.
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotificationDelivery { .. } => ErrorSeverity::Medium,
            Self::Storage { .. } | Self::Deserialization { .. } => ErrorSeverity::High,
            Self::TypeMismatch { .. } | Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Log this error at the level matching its severity.
    pub fn log(&self) {
        self.record_metrics();
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(error_code = self.code(), error = %self, "ledger error");
            }
            ErrorSeverity::Medium => {
                warn!(error_code = self.code(), error = %self, "ledger error");
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "chronicle_errors_total",
            "code" => self.code(),
            "retryable" => if self.is_retryable() { "true" } else { "false" },
        )
        .increment(1);
    }
}

impl ChronicleError {
    /// Attach a source error to a `Storage` variant.
    pub fn with_source<E>(mut self, src: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Self::Storage { source, .. } = &mut self {
            *source = Some(Box::new(src));
        }
        self
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Driver Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for ChronicleError {
    fn from(error: sqlx::Error) -> Self {
        let context = match &error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                "database connection unavailable".to_string()
            }
            sqlx::Error::Database(db_err) => format!("write rejected: {}", db_err),
            other => other.to_string(),
        };
        Self::Storage {
            context,
            source: Some(Box::new(error)),
        }
    }
}

impl From<redis::RedisError> for ChronicleError {
    fn from(error: redis::RedisError) -> Self {
        Self::NotificationDelivery {
            target: "redis".to_string(),
            detail: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChronicleError {
    fn from(error: reqwest::Error) -> Self {
        Self::NotificationDelivery {
            target: "webhook".to_string(),
            detail: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ChronicleError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ChronicleError::storage("x").code(), "STORAGE_ERROR");
        assert_eq!(
            ChronicleError::deserialization("bogus_tag", "unknown tag").code(),
            "DESERIALIZATION_ERROR"
        );
        assert_eq!(
            ChronicleError::TypeMismatch {
                expected: "issue_resolution_started",
                actual: "token_usage_recorded".to_string(),
            }
            .code(),
            "TYPE_MISMATCH"
        );
        assert_eq!(
            ChronicleError::delivery("queue", "boom").code(),
            "NOTIFICATION_DELIVERY_FAILED"
        );
        assert_eq!(
            ChronicleError::Configuration("both sinks set".into()).code(),
            "CONFIGURATION_ERROR"
        );
    }

    #[test]
    fn test_retryability() {
        assert!(ChronicleError::storage("down").is_retryable());
        assert!(ChronicleError::delivery("queue", "down").is_retryable());
        assert!(!ChronicleError::deserialization("t", "d").is_retryable());
        assert!(!ChronicleError::Configuration("bad".into()).is_retryable());
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            ChronicleError::delivery("webhook", "x").severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ChronicleError::storage("x").severity(),
            ErrorSeverity::High
        );
        assert_eq!(
            ChronicleError::Configuration("x".into()).severity(),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_display_includes_tag() {
        let err = ChronicleError::deserialization("mystery_event", "no codec registered");
        let rendered = err.to_string();
        assert!(rendered.contains("mystery_event"));
        assert!(rendered.contains("no codec registered"));
    }
}
