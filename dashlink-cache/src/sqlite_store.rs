//! SQLite-backed session store.
//!
//! One small table keyed by the namespaced cache key. A separate file is
//! used so session state is isolated from anything else the host app
//! persists.

use crate::cache::CacheEntry;
use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::sync::{Arc, Mutex};

/// Session store backed by SQLite.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Opens (or creates) a session store at the given path.
    pub fn new(path: &str) -> CacheResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CacheError::Storage(format!("failed to open session store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory session store (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CacheError::Storage(format!("failed to open in-memory session store: {e}"))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                ttl_ms INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| CacheError::Storage(format!("failed to init session schema: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> CacheResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Storage("session store poisoned".to_string()))
    }
}

impl crate::session::SessionStore for SqliteSessionStore {
    fn put(&self, key: &str, entry: &CacheEntry) -> CacheResult<()> {
        let value = serde_json::to_string(&entry.value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO session_cache (key, value, captured_at, ttl_ms) VALUES (?1, ?2, ?3, ?4)",
            params![
                key,
                value,
                entry.captured_at.to_rfc3339(),
                entry.ttl.as_millis() as i64,
            ],
        )
        .map_err(|e| CacheError::Storage(format!("failed to persist cache entry: {e}")))?;
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT value, captured_at, ttl_ms FROM session_cache WHERE key = ?1",
                params![key],
                |row| {
                    let value: String = row.get(0)?;
                    let captured_at: String = row.get(1)?;
                    let ttl_ms: i64 = row.get(2)?;
                    Ok((value, captured_at, ttl_ms))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(CacheError::Storage(format!(
                    "failed to read cache entry: {other}"
                ))),
            })?;

        let Some((value, captured_at, ttl_ms)) = row else {
            return Ok(None);
        };

        let value = serde_json::from_str(&value)?;
        let captured_at = DateTime::parse_from_rfc3339(&captured_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CacheError::Storage(format!("corrupt captured_at: {e}")))?;

        Ok(Some(CacheEntry {
            value,
            captured_at,
            ttl: std::time::Duration::from_millis(ttl_ms.max(0) as u64),
        }))
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM session_cache WHERE key = ?1", params![key])
            .map_err(|e| CacheError::Storage(format!("failed to remove cache entry: {e}")))?;
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM session_cache", [])
            .map_err(|e| CacheError::Storage(format!("failed to clear session store: {e}")))?;
        Ok(())
    }
}
