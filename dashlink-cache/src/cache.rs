//! The last-known-good cache.
//!
//! Holds the most recent value per logical subscription path so the UI
//! always has something to render while the live channel is down.
//! Expired entries are treated as absent and evicted lazily on read.

use crate::error::CacheResult;
use crate::session::SessionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix applied to mirror keys so the session store can be shared.
pub const NAMESPACE: &str = "dashlink.cache.";

/// A cached value with its capture time and time-to-live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub captured_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Whether the entry has outlived its TTL at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.captured_at > ttl,
            Err(_) => false,
        }
    }
}

/// In-memory TTL cache with a best-effort session-persisted mirror.
pub struct LocalCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    mirror: Option<Arc<dyn SessionStore>>,
    default_ttl: Duration,
}

impl LocalCache {
    /// Creates a cache with no persisted mirror.
    #[must_use]
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            mirror: None,
            default_ttl,
        }
    }

    /// Creates a cache mirrored to the given session store.
    #[must_use]
    pub fn with_mirror(mirror: Arc<dyn SessionStore>, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            mirror: Some(mirror),
            default_ttl,
        }
    }

    /// The configured default TTL.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores a value under the logical path key with the default TTL.
    pub fn set_default(&self, key: &str, value: Value) {
        self.set(key, value, self.default_ttl);
    }

    /// Stores a value with an explicit TTL.
    ///
    /// The in-memory map is authoritative; the mirror write is
    /// best-effort and any failure is logged and swallowed.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            captured_at: Utc::now(),
            ttl,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), entry.clone());
        }
        if let Some(mirror) = &self.mirror
            && let Err(e) = mirror.put(&mirror_key(key), &entry)
        {
            warn!(key, error = %e, "failed to mirror cache entry to session store");
        }
    }

    /// Returns the cached value, or `None` if missing or expired.
    ///
    /// Expired entries are evicted on read; stale data is never
    /// returned. A memory miss falls through to the mirror so a
    /// same-session reload starts warm.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Utc::now();

        if let Ok(mut entries) = self.entries.lock() {
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {
                    debug!(key, "evicting expired cache entry");
                    entries.remove(key);
                    self.mirror_remove(key);
                    return None;
                }
                None => {}
            }
        }

        let mirror = self.mirror.as_ref()?;
        match mirror.get(&mirror_key(key)) {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                if let Ok(mut entries) = self.entries.lock() {
                    entries.insert(key.to_string(), entry.clone());
                }
                Some(entry.value)
            }
            Ok(Some(_)) => {
                self.mirror_remove(key);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "session store read failed");
                None
            }
        }
    }

    /// Deep-merges a patch into the cached object, refreshing its
    /// capture time. Returns false when there is nothing to merge into.
    pub fn merge(&self, key: &str, patch: &Value) -> bool {
        let Some(mut current) = self.get(key) else {
            return false;
        };
        merge_value(&mut current, patch);
        self.set(key, current, self.default_ttl);
        true
    }

    /// Removes an entry from memory and mirror (confirmed remote delete).
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        self.mirror_remove(key);
    }

    /// Drops everything, memory and mirror.
    pub fn clear(&self) -> CacheResult<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Some(mirror) = &self.mirror {
            mirror.clear()?;
        }
        Ok(())
    }

    fn mirror_remove(&self, key: &str) {
        if let Some(mirror) = &self.mirror
            && let Err(e) = mirror.remove(&mirror_key(key))
        {
            warn!(key, error = %e, "session store remove failed");
        }
    }
}

fn mirror_key(key: &str) -> String {
    format!("{NAMESPACE}{key}")
}

/// Recursive object merge; a null in the patch is an explicit clear and
/// overwrites, scalars and arrays replace wholesale.
fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_child) in patch_map {
                match target_map.get_mut(key) {
                    Some(target_child) if target_child.is_object() && patch_child.is_object() => {
                        merge_value(target_child, patch_child);
                    }
                    _ => {
                        target_map.insert(key.clone(), patch_child.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
