//! Real-time sync and resilience layer for Dashlink clients.
//!
//! WebView mini-app hosts suspend pages, drop sockets, and leak
//! stringified `undefined`s into payloads. This crate keeps a client
//! usable anyway:
//!
//! - **Transport**: the `RemoteStore` trait abstracts the tree store
//!   (live channels, puts, merges, atomic increments)
//! - **Registry**: live subscriptions with cached fallback on failure
//! - **Supervisor**: connection state machine with capped exponential
//!   reconnect, driven by host lifecycle events
//! - **Writer**: sanitized, retrying mutations
//! - **Client**: the facade wiring it all together
//!
//! # Example
//!
//! ```no_run
//! use dashlink_sync::{SyncClient, SyncConfig};
//! use dashlink_sync::transport::mock::MockRemoteStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> dashlink_sync::SyncResult<()> {
//! let store = Arc::new(MockRemoteStore::new());
//! let client = SyncClient::new(store, SyncConfig::default());
//! let mut profile = client.subscribe("entities/user-1").await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod error;
pub mod host;
mod registry;
mod sanitize;
mod supervisor;
pub mod transport;
mod writer;

pub use backoff::Backoff;
pub use client::{SyncClient, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use host::{HostEvent, ReadyGate, ReadySignal, ready_gate};
pub use registry::{SubscriptionHandle, SubscriptionRegistry};
pub use sanitize::{ensure_wire_safe, sanitize_payload};
pub use supervisor::{ConnState, ConnectionStatus, ConnectionSupervisor, ReconnectPolicy};
pub use transport::{ChannelEvent, LiveChannel, RemoteStore};
pub use writer::{RetryPolicy, SafeWriter};
