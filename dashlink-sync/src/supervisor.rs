//! Connection supervision.
//!
//! Tracks connection state and drives recovery. The WebView host kills
//! the socket whenever the page is backgrounded, so recovery is the
//! normal case, not the exception: every foreground or online signal
//! triggers a probe-and-resubscribe loop with exponential backoff, and
//! after the attempt cap the supervisor parks in `Offline` until the
//! host signals again. It never spins on a dead network.

use crate::backoff::Backoff;
use crate::error::SyncResult;
use crate::host::HostEvent;
use crate::registry::SubscriptionRegistry;
use crate::transport::RemoteStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// Initial state, nothing attempted yet.
    #[default]
    Disconnected,
    /// A recovery loop is running.
    Connecting,
    /// Probe succeeded and all subscriptions are attached.
    Connected,
    /// Recovery gave up or the host reported no network; waiting for an
    /// external event to try again.
    Offline,
}

/// Observable connection status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnState,
    /// Whether a connection has ever been established.
    pub is_initialized: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Attempts consumed in the current (or last) recovery loop.
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Reconnection tuning.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Supervises the connection to the remote store.
pub struct ConnectionSupervisor {
    store: Arc<dyn RemoteStore>,
    registry: SubscriptionRegistry,
    policy: ReconnectPolicy,
    status_tx: watch::Sender<ConnectionStatus>,
    reconnecting: AtomicBool,
}

impl ConnectionSupervisor {
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        registry: SubscriptionRegistry,
        policy: ReconnectPolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        Self {
            store,
            registry,
            policy,
            status_tx,
            reconnecting: AtomicBool::new(false),
        }
    }

    /// A watch receiver observing status transitions.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Runs one recovery loop: probe, then reattach every subscription.
    ///
    /// Concurrent calls coalesce: if a loop is already running the call
    /// returns immediately and the running loop's outcome stands. On
    /// exhaustion the state is `Offline` with the attempt count left at
    /// the cap; only an explicit event restarts recovery.
    pub async fn reconnect(&self) {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            debug!("reconnect already in progress, coalescing");
            return;
        }

        let mut backoff = Backoff::new(self.policy.base_delay, self.policy.max_delay);
        for attempt in 1..=self.policy.max_attempts {
            self.status_tx.send_modify(|s| {
                s.state = ConnState::Connecting;
                s.attempts = attempt;
            });
            match self.try_connect().await {
                Ok(()) => {
                    info!(attempt, "connection recovered");
                    self.status_tx.send_modify(|s| {
                        s.state = ConnState::Connected;
                        s.attempts = 0;
                        s.is_initialized = true;
                        s.last_connected_at = Some(Utc::now());
                        s.last_error = None;
                    });
                    self.reconnecting.store(false, Ordering::SeqCst);
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "reconnect attempt failed");
                    self.status_tx.send_modify(|s| s.last_error = Some(e.to_string()));
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            attempts = self.policy.max_attempts,
            "reconnect attempts exhausted, going offline"
        );
        self.status_tx.send_modify(|s| {
            s.state = ConnState::Offline;
            s.attempts = self.policy.max_attempts;
        });
        self.reconnecting.store(false, Ordering::SeqCst);
    }

    /// Tears down live channels and parks offline.
    pub fn go_offline(&self) {
        self.registry.release_all();
        self.status_tx.send_modify(|s| s.state = ConnState::Offline);
    }

    /// Consumes host events until the channel closes.
    ///
    /// Foreground and online signals trigger recovery; background and
    /// offline signals release channels so the host can suspend cleanly.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            debug!(?event, "host event");
            match event {
                HostEvent::Foreground | HostEvent::Online => self.reconnect().await,
                HostEvent::Background | HostEvent::Offline => self.go_offline(),
            }
        }
        debug!("host event channel closed, supervisor stopping");
    }

    async fn try_connect(&self) -> SyncResult<()> {
        self.store.probe().await?;
        self.registry.resubscribe_all(&self.store).await
    }
}
