//! Session-persisted mirror of the cache.
//!
//! The mirror survives a reload of the same session but is not expected
//! to survive a cold start. It is strictly best-effort: the in-memory
//! cache stays authoritative whether or not mirror writes succeed.

use crate::cache::CacheEntry;
use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A key/value store holding mirrored cache entries.
pub trait SessionStore: Send + Sync {
    /// Persists an entry under the given namespaced key.
    fn put(&self, key: &str, entry: &CacheEntry) -> CacheResult<()>;

    /// Loads an entry, if present.
    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Removes an entry; removing a missing key is a no-op.
    fn remove(&self, key: &str) -> CacheResult<()>;

    /// Removes every entry.
    fn clear(&self) -> CacheResult<()>;
}

/// In-memory session store, used in tests and as a null mirror.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` fail, simulating quota exhaustion
    /// or disabled storage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Storage("session storage unavailable".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| CacheError::Storage("session store poisoned".to_string()))?
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| CacheError::Storage("session store poisoned".to_string()))?
            .get(key)
            .cloned())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Storage("session store poisoned".to_string()))?
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Storage("session store poisoned".to_string()))?
            .clear();
        Ok(())
    }
}
