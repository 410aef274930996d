//! The sync client facade.
//!
//! One context object wires the cache, registry, writer, and supervisor
//! together and is the only type embedders construct. All state lives
//! here; nothing in the crate is global, so tests and multi-account
//! hosts can run several clients side by side.

use crate::error::{SyncError, SyncResult};
use crate::host::{HostEvent, ReadyGate};
use crate::registry::{SubscriptionHandle, SubscriptionRegistry};
use crate::supervisor::{ConnState, ConnectionStatus, ConnectionSupervisor, ReconnectPolicy};
use crate::transport::RemoteStore;
use crate::writer::{RetryPolicy, SafeWriter};
use dashlink_cache::{LocalCache, SessionStore};
use dashlink_types::TreePath;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Client tuning. The defaults match production behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// TTL applied to cached snapshots.
    pub cache_ttl: Duration,
    /// Channel errors tolerated before a subscription is parked.
    pub channel_error_threshold: u32,
    /// Delivery buffer per subscription.
    pub subscription_buffer: usize,
    /// How long `start` waits for the host-ready signal.
    pub ready_timeout: Duration,
    pub write_retry: RetryPolicy,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            channel_error_threshold: 3,
            subscription_buffer: 16,
            ready_timeout: Duration::from_secs(10),
            write_retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Entry point for embedders: subscriptions, writes, and connection
/// state behind one handle.
pub struct SyncClient {
    store: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    registry: SubscriptionRegistry,
    writer: SafeWriter,
    supervisor: Arc<ConnectionSupervisor>,
    config: SyncConfig,
}

impl SyncClient {
    /// Builds a client with an in-memory cache.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        let cache = Arc::new(LocalCache::in_memory(config.cache_ttl));
        Self::assemble(store, cache, config)
    }

    /// Builds a client whose cache mirrors to a session store, so a
    /// same-session reload starts warm.
    #[must_use]
    pub fn with_session_store(
        store: Arc<dyn RemoteStore>,
        session: Arc<dyn SessionStore>,
        config: SyncConfig,
    ) -> Self {
        let cache = Arc::new(LocalCache::with_mirror(session, config.cache_ttl));
        Self::assemble(store, cache, config)
    }

    fn assemble(store: Arc<dyn RemoteStore>, cache: Arc<LocalCache>, config: SyncConfig) -> Self {
        let registry = SubscriptionRegistry::new(
            Arc::clone(&cache),
            config.channel_error_threshold,
            config.subscription_buffer,
        );
        let writer = SafeWriter::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            config.write_retry.clone(),
        );
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&store),
            registry.clone(),
            config.reconnect.clone(),
        ));
        Self {
            store,
            cache,
            registry,
            writer,
            supervisor,
            config,
        }
    }

    /// Waits for the host-ready signal, spawns the supervisor loop, and
    /// runs the first connection attempt.
    ///
    /// Returns the sender the embedder feeds host lifecycle and
    /// connectivity events into.
    pub async fn start(&self, ready: ReadyGate) -> SyncResult<mpsc::Sender<HostEvent>> {
        ready.wait(self.config.ready_timeout).await?;
        info!("host ready, starting sync");
        let (events_tx, events_rx) = mpsc::channel(16);
        tokio::spawn(Arc::clone(&self.supervisor).run(events_rx));
        self.supervisor.reconnect().await;
        Ok(events_tx)
    }

    /// Subscribes to live snapshots of the subtree at `path`.
    ///
    /// The handle receives the cached last-known value immediately when
    /// one exists, then live updates. Works offline: the live channel
    /// attaches now if connected, otherwise on the next reconnect.
    pub async fn subscribe(&self, path: &str) -> SyncResult<SubscriptionHandle> {
        let path = parse_path(path)?;
        let handle = self.registry.subscribe(path.clone());
        if self.supervisor.current().state == ConnState::Connected
            && let Err(e) = self.registry.attach(&self.store, handle.id()).await
        {
            // Cached delivery already happened; recovery reattaches.
            warn!(path = path.as_str(), error = %e, "channel attach failed, deferring to reconnect");
        }
        Ok(handle)
    }

    /// Replaces the subtree at `path` (sanitized, retried).
    pub async fn write(&self, path: &str, value: Value) -> SyncResult<()> {
        self.writer.write(&parse_path(path)?, value).await
    }

    /// Merges fields into the subtree at `path` (sanitized, retried).
    pub async fn update(&self, path: &str, patch: Value) -> SyncResult<()> {
        self.writer.merge(&parse_path(path)?, patch).await
    }

    /// Atomically adjusts a shared numeric field.
    pub async fn increment(&self, path: &str, field: &str, delta: i64) -> SyncResult<()> {
        self.writer.increment(&parse_path(path)?, field, delta).await
    }

    /// The cached last-known value for a path, if fresh.
    #[must_use]
    pub fn cached(&self, path: &str) -> Option<Value> {
        self.cache.get(path)
    }

    /// Observes connection status transitions.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.supervisor.status()
    }

    /// Current connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.supervisor.current()
    }

    /// Manually triggers a recovery loop.
    pub async fn reconnect(&self) {
        self.supervisor.reconnect().await;
    }

    /// Releases every live channel and parks offline. Registrations and
    /// the cache survive, so `reconnect` brings everything back.
    pub fn shutdown(&self) {
        self.supervisor.go_offline();
    }

    /// Drops all cached data, memory and session mirror.
    pub fn clear_cache(&self) -> SyncResult<()> {
        self.cache.clear().map_err(SyncError::from)
    }
}

fn parse_path(path: &str) -> SyncResult<TreePath> {
    TreePath::parse(path).map_err(|e| SyncError::validation(path, e.to_string()))
}
