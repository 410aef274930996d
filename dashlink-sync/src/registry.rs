//! Subscription registry.
//!
//! Owns every live subscription: one entry per subscription id, each
//! with its logical path, entity kind, and a consumer channel. The
//! registry is what survives a reconnect: entries persist while their
//! transport channels are torn down and reopened, and each snapshot is
//! mapped to its canonical form and written to the last-known-good cache
//! before delivery.
//!
//! Entries carry an epoch counter bumped on every reattach and release.
//! A pump task records errors with the epoch it was spawned under, so
//! events from a superseded channel are discarded instead of being
//! charged against the fresh one.

use crate::error::{SyncError, SyncResult};
use crate::transport::{ChannelEvent, LiveChannel, RemoteStore};
use dashlink_cache::LocalCache;
use dashlink_model::EntityKind;
use dashlink_types::{SubscriptionId, TreePath};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct SubEntry {
    path: TreePath,
    kind: EntityKind,
    tx: mpsc::Sender<Option<Value>>,
    active: bool,
    error_count: u32,
    epoch: u64,
    pump: Option<JoinHandle<()>>,
}

struct RegistryInner {
    subs: Mutex<HashMap<SubscriptionId, SubEntry>>,
    cache: Arc<LocalCache>,
    error_threshold: u32,
    buffer: usize,
}

/// Registry of live subscriptions, shared by the supervisor and facade.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

/// A consumer's end of one subscription.
///
/// `recv` yields `Some(value)` for each mapped snapshot and `None` when
/// the registry fell back to an empty cache after a channel failure.
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    rx: mpsc::Receiver<Option<Value>>,
    registry: Weak<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates a registry backed by the given cache.
    #[must_use]
    pub fn new(cache: Arc<LocalCache>, error_threshold: u32, buffer: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subs: Mutex::new(HashMap::new()),
                cache,
                error_threshold,
                buffer,
            }),
        }
    }

    /// Registers a subscription for `path` and returns its handle.
    ///
    /// The cached last-known value, if any, is delivered immediately so
    /// the consumer renders something even while offline. The live
    /// channel is attached separately when the connection is up.
    #[must_use]
    pub fn subscribe(&self, path: TreePath) -> SubscriptionHandle {
        let id = SubscriptionId::new();
        let kind = EntityKind::for_path(&path);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        if let Some(cached) = self.inner.cache.get(path.as_str()) {
            debug!(path = path.as_str(), "delivering cached value on subscribe");
            let _ = tx.try_send(Some(cached));
        }

        let entry = SubEntry {
            path,
            kind,
            tx,
            active: true,
            error_count: 0,
            epoch: 0,
            pump: None,
        };
        if let Ok(mut subs) = self.inner.subs.lock() {
            subs.insert(id, entry);
        }

        SubscriptionHandle {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a subscription and stops its pump. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        RegistryInner::detach(&self.inner, id);
    }

    /// Opens a live channel for the subscription and starts pumping it.
    ///
    /// Also the explicit way back for a subscription parked at the
    /// error threshold: success reactivates it and clears its count.
    pub async fn attach(&self, store: &Arc<dyn RemoteStore>, id: SubscriptionId) -> SyncResult<()> {
        let path = {
            let subs = self.inner.subs.lock().map_err(poisoned)?;
            let entry = subs.get(&id).ok_or(SyncError::ChannelClosed)?;
            entry.path.clone()
        };
        let channel = store.open_channel(&path).await?;
        self.inner.install_pump(id, channel);
        Ok(())
    }

    /// Reopens a channel for every active subscription.
    ///
    /// Used by the connection supervisor after a probe succeeds. Error
    /// counts reset to 0 on success. Entries parked at the error
    /// threshold are skipped; they come back only through an explicit
    /// `attach`. The first failed open aborts and is reported so the
    /// reconnect attempt as a whole can be retried. Entries
    /// unsubscribed while an open is in flight are skipped by
    /// `install_pump`'s liveness check.
    pub async fn resubscribe_all(&self, store: &Arc<dyn RemoteStore>) -> SyncResult<()> {
        let ids: Vec<(SubscriptionId, TreePath)> = {
            let subs = self.inner.subs.lock().map_err(poisoned)?;
            subs.iter()
                .filter(|(_, e)| e.active)
                .map(|(id, e)| (*id, e.path.clone()))
                .collect()
        };

        let count = ids.len();
        for (id, path) in ids {
            let channel = store.open_channel(&path).await?;
            self.inner.install_pump(id, channel);
        }
        info!(count, "resubscribed active subscriptions");
        Ok(())
    }

    /// Tears down every live channel but keeps the registrations.
    ///
    /// Called when the host backgrounds the page or the network drops;
    /// `resubscribe_all` restores the channels later.
    pub fn release_all(&self) {
        if let Ok(mut subs) = self.inner.subs.lock() {
            for entry in subs.values_mut() {
                entry.epoch += 1;
                if let Some(pump) = entry.pump.take() {
                    pump.abort();
                }
            }
        }
        debug!("released all live channels");
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.subs.lock().map(|s| s.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the subscription still receives live updates.
    #[must_use]
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.inner
            .subs
            .lock()
            .ok()
            .and_then(|s| s.get(&id).map(|e| e.active))
            .unwrap_or(false)
    }

    /// Consecutive channel errors charged to the subscription.
    #[must_use]
    pub fn error_count(&self, id: SubscriptionId) -> u32 {
        self.inner
            .subs
            .lock()
            .ok()
            .and_then(|s| s.get(&id).map(|e| e.error_count))
            .unwrap_or(0)
    }
}

impl RegistryInner {
    /// Replaces the entry's pump with one draining `channel`.
    ///
    /// Bumping the epoch first makes any still-running old pump stale:
    /// its events no longer match and are dropped on arrival.
    fn install_pump(self: &Arc<Self>, id: SubscriptionId, channel: LiveChannel) {
        let epoch = {
            let Ok(mut subs) = self.subs.lock() else {
                return;
            };
            let Some(entry) = subs.get_mut(&id) else {
                return;
            };
            entry.epoch += 1;
            if let Some(old) = entry.pump.take() {
                old.abort();
            }
            entry.active = true;
            entry.error_count = 0;
            entry.epoch
        };

        let weak = Arc::downgrade(self);
        let pump = tokio::spawn(pump_channel(weak, id, epoch, channel));

        if let Ok(mut subs) = self.subs.lock()
            && let Some(entry) = subs.get_mut(&id)
            && entry.epoch == epoch
        {
            entry.pump = Some(pump);
        } else {
            pump.abort();
        }
    }

    /// Delivers a mapped snapshot and refreshes the cache.
    ///
    /// The subscription table is locked only for the epoch check;
    /// mapping and the cache write (which may hit the session mirror's
    /// disk) run without it so snapshots never stall other registry
    /// operations.
    ///
    /// Returns false when the pump that produced it should stop.
    fn deliver_snapshot(&self, id: SubscriptionId, epoch: u64, raw: dashlink_types::RawRecord) -> bool {
        let (path, kind, tx) = {
            let Ok(subs) = self.subs.lock() else {
                return false;
            };
            let Some(entry) = subs.get(&id) else {
                return false;
            };
            if entry.epoch != epoch || !entry.active {
                return false;
            }
            (entry.path.clone(), entry.kind, entry.tx.clone())
        };

        let fallback_id = path.segments().last().unwrap_or("");
        let mapped = kind.map(&raw, fallback_id);
        self.cache.set_default(path.as_str(), mapped.clone());
        if tx.try_send(Some(mapped)).is_err() {
            debug!(path = path.as_str(), "subscriber not keeping up, dropping snapshot");
        }
        true
    }

    /// Charges a channel error to the subscription and falls back to
    /// the cache. At the threshold the entry is parked until the next
    /// successful resubscribe.
    ///
    /// Returns false when the pump that reported it should stop.
    fn record_channel_error(&self, id: SubscriptionId, epoch: u64, err: &SyncError) -> bool {
        let (path, tx, parked) = {
            let Ok(mut subs) = self.subs.lock() else {
                return false;
            };
            let Some(entry) = subs.get_mut(&id) else {
                return false;
            };
            if entry.epoch != epoch || !entry.active {
                debug!(path = entry.path.as_str(), "ignoring error from superseded channel");
                return false;
            }

            entry.error_count += 1;
            warn!(
                path = entry.path.as_str(),
                error = %err,
                count = entry.error_count,
                "live channel failed, serving cached value"
            );

            let parked = entry.error_count >= self.error_threshold;
            if parked {
                entry.active = false;
                entry.pump = None;
                warn!(
                    path = entry.path.as_str(),
                    "subscription parked after repeated channel failures"
                );
            }
            (entry.path.clone(), entry.tx.clone(), parked)
        };

        // The cache read may fall through to the session mirror; keep
        // it outside the subscription table lock.
        let fallback = self.cache.get(path.as_str());
        let _ = tx.try_send(fallback);
        !parked
    }

    fn detach(inner: &Arc<Self>, id: SubscriptionId) {
        if let Ok(mut subs) = inner.subs.lock()
            && let Some(mut entry) = subs.remove(&id)
        {
            entry.epoch += 1;
            if let Some(pump) = entry.pump.take() {
                pump.abort();
            }
            debug!(path = entry.path.as_str(), "unsubscribed");
        }
    }
}

async fn pump_channel(
    registry: Weak<RegistryInner>,
    id: SubscriptionId,
    epoch: u64,
    mut channel: LiveChannel,
) {
    while let Some(event) = channel.next().await {
        let Some(inner) = registry.upgrade() else {
            return;
        };
        let keep_pumping = match event {
            ChannelEvent::Snapshot(raw) => inner.deliver_snapshot(id, epoch, raw),
            ChannelEvent::Lost(err) => inner.record_channel_error(id, epoch, &err),
        };
        if !keep_pumping {
            return;
        }
    }
    // Channel ended without an error event; treat it as a loss so the
    // consumer gets its cached fallback.
    if let Some(inner) = registry.upgrade() {
        inner.record_channel_error(id, epoch, &SyncError::ChannelClosed);
    }
}

impl SubscriptionHandle {
    /// The subscription's id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receives the next delivery; `None` when the registry was dropped.
    pub async fn recv(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }

    /// Explicitly unsubscribes (equivalent to dropping the handle).
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            RegistryInner::detach(&inner, self.id);
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SyncError {
    SyncError::Unknown("subscription table poisoned".to_string())
}
