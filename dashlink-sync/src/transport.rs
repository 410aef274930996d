//! Remote store abstraction.
//!
//! Defines the trait the sync layer talks to the tree-structured data
//! store through, so the engine works against any backend (and against
//! the mock in tests). The store's consistency model is a given: it
//! delivers snapshots per path in order, and exposes an atomic increment
//! primitive for counters that multiple clients mutate concurrently.

use crate::error::SyncResult;
use async_trait::async_trait;
use dashlink_types::{RawRecord, TreePath};
use serde_json::Value;
use tokio::sync::mpsc;

/// An event delivered on a live channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A fresh snapshot of the subscribed subtree.
    Snapshot(RawRecord),
    /// The channel failed; the subscription layer decides what happens next.
    Lost(crate::error::SyncError),
}

/// A live subscription to one logical path.
///
/// Dropping the channel releases the underlying connection.
pub struct LiveChannel {
    rx: mpsc::Receiver<ChannelEvent>,
}

impl LiveChannel {
    /// Wraps a transport-provided event receiver.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { rx }
    }

    /// Receives the next event. `None` means the channel ended.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}

/// The remote tree store the client synchronizes against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Cheap connectivity check; used as the reconnection probe.
    async fn probe(&self) -> SyncResult<()>;

    /// Opens a live channel pushing snapshots of the subtree at `path`.
    async fn open_channel(&self, path: &TreePath) -> SyncResult<LiveChannel>;

    /// Replaces the subtree at `path` with `value`.
    async fn put(&self, path: &TreePath, value: Value) -> SyncResult<()>;

    /// Merges `patch` into the subtree at `path` (nulls clear fields).
    async fn merge(&self, path: &TreePath, patch: Value) -> SyncResult<()>;

    /// Atomically increments a numeric field. Counters mutated by
    /// multiple writers must go through this, never read-modify-write.
    async fn increment(&self, path: &TreePath, field: &str, delta: i64) -> SyncResult<()>;
}

/// A mock remote store for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scriptable in-memory store: tests inject snapshots and failures,
    /// and inspect everything the engine sent.
    #[derive(Default)]
    pub struct MockRemoteStore {
        senders: Mutex<HashMap<String, Vec<mpsc::Sender<ChannelEvent>>>>,
        puts: Mutex<Vec<(String, Value)>>,
        merges: Mutex<Vec<(String, Value)>>,
        increments: Mutex<Vec<(String, String, i64)>>,
        probe_failures: AtomicU32,
        open_failures: AtomicU32,
        put_failures: Mutex<VecDeque<SyncError>>,
        probe_count: AtomicU32,
    }

    impl MockRemoteStore {
        /// Creates a store that succeeds at everything.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `n` probes fail with a transient error.
        pub fn fail_probes(&self, n: u32) {
            self.probe_failures.store(n, Ordering::SeqCst);
        }

        /// Makes the next `n` channel opens fail with a transient error.
        pub fn fail_opens(&self, n: u32) {
            self.open_failures.store(n, Ordering::SeqCst);
        }

        /// Queues an error for an upcoming `put`/`merge`/`increment` call.
        pub fn fail_next_write(&self, error: SyncError) {
            self.put_failures.lock().unwrap().push_back(error);
        }

        /// Pushes a snapshot to every open channel for `path`.
        pub fn push_snapshot(&self, path: &str, value: Value) {
            self.broadcast(path, || ChannelEvent::Snapshot(RawRecord::new(value.clone())));
        }

        /// Pushes a channel-level error to every open channel for `path`.
        pub fn push_channel_error(&self, path: &str, message: &str) {
            let message = message.to_string();
            self.broadcast(path, || {
                ChannelEvent::Lost(SyncError::TransientNetwork(message.clone()))
            });
        }

        /// Number of live (receiver still held) channels for `path`.
        #[must_use]
        pub fn live_channel_count(&self, path: &str) -> usize {
            let mut senders = self.senders.lock().unwrap();
            let list = senders.entry(path.to_string()).or_default();
            list.retain(|tx| !tx.is_closed());
            list.len()
        }

        /// Everything written via `put`, in order.
        #[must_use]
        pub fn puts(&self) -> Vec<(String, Value)> {
            self.puts.lock().unwrap().clone()
        }

        /// Everything written via `merge`, in order.
        #[must_use]
        pub fn merges(&self) -> Vec<(String, Value)> {
            self.merges.lock().unwrap().clone()
        }

        /// Every atomic increment, in order.
        #[must_use]
        pub fn increments(&self) -> Vec<(String, String, i64)> {
            self.increments.lock().unwrap().clone()
        }

        /// How many probes the engine issued.
        #[must_use]
        pub fn probe_count(&self) -> u32 {
            self.probe_count.load(Ordering::SeqCst)
        }

        fn broadcast(&self, path: &str, event: impl Fn() -> ChannelEvent) {
            let mut senders = self.senders.lock().unwrap();
            if let Some(list) = senders.get_mut(path) {
                list.retain(|tx| !tx.is_closed());
                for tx in list.iter() {
                    let _ = tx.try_send(event());
                }
            }
        }

        fn take_failure(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn next_write_failure(&self) -> Option<SyncError> {
            self.put_failures.lock().unwrap().pop_front()
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn probe(&self) -> SyncResult<()> {
            self.probe_count.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.probe_failures) {
                return Err(SyncError::TransientNetwork("probe failed".to_string()));
            }
            Ok(())
        }

        async fn open_channel(&self, path: &TreePath) -> SyncResult<LiveChannel> {
            if Self::take_failure(&self.open_failures) {
                return Err(SyncError::TransientNetwork("open failed".to_string()));
            }
            let (tx, rx) = mpsc::channel(32);
            self.senders
                .lock()
                .unwrap()
                .entry(path.as_str().to_string())
                .or_default()
                .push(tx);
            Ok(LiveChannel::new(rx))
        }

        async fn put(&self, path: &TreePath, value: Value) -> SyncResult<()> {
            if let Some(err) = self.next_write_failure() {
                return Err(err);
            }
            self.puts
                .lock()
                .unwrap()
                .push((path.as_str().to_string(), value));
            Ok(())
        }

        async fn merge(&self, path: &TreePath, patch: Value) -> SyncResult<()> {
            if let Some(err) = self.next_write_failure() {
                return Err(err);
            }
            self.merges
                .lock()
                .unwrap()
                .push((path.as_str().to_string(), patch));
            Ok(())
        }

        async fn increment(&self, path: &TreePath, field: &str, delta: i64) -> SyncResult<()> {
            if let Some(err) = self.next_write_failure() {
                return Err(err);
            }
            self.increments.lock().unwrap().push((
                path.as_str().to_string(),
                field.to_string(),
                delta,
            ));
            Ok(())
        }
    }
}
