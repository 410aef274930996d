//! Sanitized, retrying writes.
//!
//! Every outbound mutation funnels through `SafeWriter`: the payload is
//! sanitized and asserted wire-safe before the first network call, then
//! sent with bounded retries. Terminal errors (permission, validation)
//! surface immediately; transient ones back off exponentially; a stale
//! read is retried exactly once. On success the last-known-good cache is
//! refreshed so reads agree with what was just written.
//!
//! Counters never go through `write`: a read-modify-write of a value
//! other clients also bump loses updates. `increment` delegates to the
//! store's atomic primitive instead.

use crate::backoff::Backoff;
use crate::error::{SyncError, SyncResult};
use crate::sanitize::{ensure_wire_safe, sanitize_payload};
use crate::transport::RemoteStore;
use dashlink_cache::LocalCache;
use dashlink_types::TreePath;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry tuning for writes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Writer guarding all mutations of the remote store.
pub struct SafeWriter {
    store: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    policy: RetryPolicy,
}

#[derive(Clone, Copy)]
enum WriteOp {
    Put,
    Merge,
}

impl SafeWriter {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, cache: Arc<LocalCache>, policy: RetryPolicy) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    /// Replaces the subtree at `path` with a sanitized `value`.
    pub async fn write(&self, path: &TreePath, value: Value) -> SyncResult<()> {
        let clean = self.prepare(path, value)?;
        self.send(path, clean.clone(), WriteOp::Put).await?;
        self.cache.set_default(path.as_str(), clean);
        Ok(())
    }

    /// Merges a sanitized `patch` into the subtree at `path`.
    ///
    /// Explicit nulls in the patch survive sanitization and clear their
    /// fields remotely and in the cache.
    pub async fn merge(&self, path: &TreePath, patch: Value) -> SyncResult<()> {
        let clean = self.prepare(path, patch)?;
        self.send(path, clean.clone(), WriteOp::Merge).await?;
        if !self.cache.merge(path.as_str(), &clean) {
            debug!(path = path.as_str(), "no cached base for patch, skipping cache refresh");
        }
        Ok(())
    }

    /// Atomically adjusts a numeric field via the store primitive.
    pub async fn increment(&self, path: &TreePath, field: &str, delta: i64) -> SyncResult<()> {
        if field.is_empty() {
            return Err(SyncError::validation(
                path.as_str(),
                "increment field must be non-empty",
            ));
        }
        self.retry(path, || self.store.increment(path, field, delta))
            .await
    }

    /// Sanitizes and asserts the payload before any network use.
    fn prepare(&self, path: &TreePath, value: Value) -> SyncResult<Value> {
        let clean = sanitize_payload(value).ok_or_else(|| {
            SyncError::validation(path.as_str(), "payload empty after sanitization")
        })?;
        ensure_wire_safe(path.as_str(), &clean)?;
        Ok(clean)
    }

    async fn send(&self, path: &TreePath, value: Value, op: WriteOp) -> SyncResult<()> {
        self.retry(path, || {
            let value = value.clone();
            async move {
                match op {
                    WriteOp::Put => self.store.put(path, value).await,
                    WriteOp::Merge => self.store.merge(path, value).await,
                }
            }
        })
        .await
    }

    async fn retry<F, Fut>(&self, path: &TreePath, mut call: F) -> SyncResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let mut backoff = Backoff::new(self.policy.base_delay, self.policy.max_delay);
        let mut stale_retried = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match call().await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(path = path.as_str(), attempt, "write succeeded after retry");
                    }
                    return Ok(());
                }
                // The stale retry is granted even when staleness first
                // shows up on the last regular attempt; a second stale
                // report surfaces as-is.
                Err(e @ SyncError::DataStale(_)) => {
                    if stale_retried {
                        return Err(e);
                    }
                    stale_retried = true;
                    warn!(path = path.as_str(), error = %e, "stale data, retrying once");
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        path = path.as_str(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "write failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
