//! Last-known-good caching for Dashlink.
//!
//! The cache exists so the dashboard never renders a hard error: while
//! the live channel to the remote store is down, subscribers keep
//! receiving the most recent value captured for their path, bounded by a
//! TTL. Entries are mirrored best-effort to a session-persisted store so
//! a same-session reload starts warm.

mod cache;
mod error;
mod session;
mod sqlite_store;

pub use cache::{CacheEntry, LocalCache, NAMESPACE};
pub use error::{CacheError, CacheResult};
pub use session::{MemorySessionStore, SessionStore};
pub use sqlite_store::SqliteSessionStore;
