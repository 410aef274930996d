//! Core type definitions for Dashlink.
//!
//! This crate defines the fundamental, UI-agnostic types used throughout
//! the sync client:
//! - Validated logical tree paths (the remote store's addressing scheme)
//! - Subscription identifiers (UUID v7)
//! - Raw-record wrappers with total, non-panicking accessors
//! - Timestamp normalization (ISO strings, epochs, server sentinels)
//!
//! All domain-specific entities (user profiles, tasks, withdrawals, etc.)
//! belong in `dashlink-model`, not here.

mod ids;
mod path;
mod raw;
mod time;

pub use ids::SubscriptionId;
pub use path::TreePath;
pub use raw::RawRecord;
pub use time::normalize_timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
