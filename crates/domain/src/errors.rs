//! Error types used throughout the worker
//!
//! Every failure carries a structured [`ErrorCategory`]. Retry decisions are
//! made from the variant, never from message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for StoreSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum StoreSyncError {
    /// Database connection or statement failure
    #[error("Database error: {0}")]
    Database(String),

    /// Transport failure (connection reset, refused, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A dependency reported itself temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Upstream answered with a non-2xx status
    #[error("Upstream HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Rolling-window budget for `key` is exhausted
    #[error("Rate limit exceeded for {key}, retry after {retry_after_ms}ms")]
    RateLimited { key: String, retry_after_ms: u64 },

    /// Breaker for the credential is open
    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    /// Referenced store, tenant, request or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload could not be parsed or is missing required fields
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No handler is registered for the job name
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error class used for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// May succeed if tried again
    Transient,
    /// Will fail the same way every time
    Permanent,
    /// A limiter or breaker refused the call
    Protection,
}

impl StoreSyncError {
    /// Classify this error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Database(_) | Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_) => {
                ErrorCategory::Transient
            }
            Self::Upstream { status, .. } => {
                if Self::is_transient_status(*status) {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::RateLimited { .. } | Self::CircuitOpen(_) => ErrorCategory::Protection,
            Self::NotFound(_)
            | Self::InvalidPayload(_)
            | Self::UnknownJob(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorCategory::Permanent,
        }
    }

    /// Whether the job runtime should retry within the same execution.
    ///
    /// Rate-limit denials are retried because the window drains on its own.
    /// An open circuit is not: its cooldown outlasts the in-process retry
    /// delays, so redelivery is left to the queue.
    pub const fn is_retryable(&self) -> bool {
        match self.category() {
            ErrorCategory::Transient => true,
            ErrorCategory::Protection => matches!(self, Self::RateLimited { .. }),
            ErrorCategory::Permanent => false,
        }
    }

    /// Whether queue-level redelivery is worthwhile after the runtime gives up
    pub const fn is_redeliverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Permanent)
    }

    /// HTTP statuses that signal a temporary upstream condition
    pub const fn is_transient_status(status: u16) -> bool {
        matches!(status, 408 | 425 | 429 | 500..=599)
    }

    /// Stable short label for metrics and failure records
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Upstream { .. } => "upstream",
            Self::RateLimited { .. } => "rate_limited",
            Self::CircuitOpen(_) => "circuit_open",
            Self::NotFound(_) => "not_found",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::UnknownJob(_) => "unknown_job",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for StoreSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

impl From<std::convert::Infallible> for StoreSyncError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

/// Result type alias for StoreSync operations
pub type Result<T> = std::result::Result<T, StoreSyncError>;
