//! Error types for the sync layer.
//!
//! The taxonomy drives retry behavior: transient conditions are retried
//! with backoff and never surfaced unless exhausted, terminal conditions
//! are surfaced immediately. No public entry point in this crate throws;
//! everything resolves to a `SyncResult`.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network unavailable or service temporarily down. Retryable.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The store rejected the caller's credentials. Terminal, not retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid path or payload, caught before any network call. Terminal.
    #[error("validation failure at {path}: {reason}")]
    Validation { path: String, reason: String },

    /// The store reported our view as stale. Retried once.
    #[error("data stale: {0}")]
    DataStale(String),

    /// An awaited signal or probe did not resolve in time.
    #[error("operation timed out")]
    Timeout,

    /// The live channel or an internal channel closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Cache layer failure.
    #[error("cache error: {0}")]
    Cache(#[from] dashlink_cache::CacheError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything unclassified. Treated conservatively as retryable up to
    /// the attempt cap, then terminal.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Builds a validation failure for the given path.
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::DataStale(_) | Self::Timeout | Self::Unknown(_)
        )
    }
}
