//! Host-environment signals.
//!
//! The WebView host suspends and resumes the page far more aggressively
//! than a normal browser tab. The embedder translates its lifecycle and
//! network callbacks into `HostEvent`s on a channel; those events are the
//! only inputs that drive the connection supervisor's state transitions.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;
use tokio::sync::oneshot;

/// A lifecycle or connectivity signal from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Page became visible / app foregrounded.
    Foreground,
    /// Page hidden / app backgrounded.
    Background,
    /// Network came back.
    Online,
    /// Network went away.
    Offline,
}

/// Creates a readiness gate pair.
///
/// The embedder keeps the `ReadySignal` and fires it exactly once when
/// the host SDK has finished loading; startup code awaits the
/// `ReadyGate` with a bounded timeout instead of polling a flag.
#[must_use]
pub fn ready_gate() -> (ReadyGate, ReadySignal) {
    let (tx, rx) = oneshot::channel();
    (ReadyGate { rx }, ReadySignal { tx: Some(tx) })
}

/// Awaitable host-readiness future, resolved at most once.
pub struct ReadyGate {
    rx: oneshot::Receiver<()>,
}

impl ReadyGate {
    /// Waits for the host to report ready.
    ///
    /// Returns `Timeout` when the bound elapses and `ChannelClosed` when
    /// the signal side was dropped without firing.
    pub async fn wait(self, timeout: Duration) -> SyncResult<()> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SyncError::ChannelClosed),
            Err(_) => Err(SyncError::Timeout),
        }
    }
}

/// The signalling half of a readiness gate.
pub struct ReadySignal {
    tx: Option<oneshot::Sender<()>>,
}

impl ReadySignal {
    /// Marks the host as ready. Subsequent calls are no-ops.
    pub fn set(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}
