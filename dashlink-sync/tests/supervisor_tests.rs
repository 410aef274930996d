use dashlink_cache::LocalCache;
use dashlink_sync::transport::mock::MockRemoteStore;
use dashlink_sync::{
    ConnState, ConnectionSupervisor, HostEvent, ReconnectPolicy, RemoteStore,
    SubscriptionRegistry,
};
use dashlink_types::TreePath;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn setup() -> (Arc<MockRemoteStore>, SubscriptionRegistry, Arc<ConnectionSupervisor>) {
    let mock = Arc::new(MockRemoteStore::new());
    let store: Arc<dyn RemoteStore> = mock.clone();
    let cache = Arc::new(LocalCache::in_memory(Duration::from_secs(60)));
    let registry = SubscriptionRegistry::new(cache, 3, 16);
    let supervisor = Arc::new(ConnectionSupervisor::new(
        store,
        registry.clone(),
        ReconnectPolicy::default(),
    ));
    (mock, registry, supervisor)
}

fn path(s: &str) -> TreePath {
    TreePath::parse(s).unwrap()
}

// ── recovery loop ────────────────────────────────────────────────

#[tokio::test]
async fn starts_disconnected() {
    let (_, _, supervisor) = setup();
    assert_eq!(supervisor.current().state, ConnState::Disconnected);
}

#[tokio::test]
async fn reconnect_probes_and_connects() {
    let (mock, _, supervisor) = setup();
    supervisor.reconnect().await;

    let status = supervisor.current();
    assert_eq!(status.state, ConnState::Connected);
    assert_eq!(status.attempts, 0);
    assert!(status.is_initialized);
    assert!(status.last_connected_at.is_some());
    assert_eq!(status.last_error, None);
    assert_eq!(mock.probe_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_backs_off_through_transient_failures() {
    let (mock, _, supervisor) = setup();
    mock.fail_probes(2);

    supervisor.reconnect().await;
    assert_eq!(supervisor.current().state, ConnState::Connected);
    assert_eq!(mock.probe_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_park_offline() {
    let (mock, _, supervisor) = setup();
    mock.fail_probes(5);

    supervisor.reconnect().await;
    let status = supervisor.current();
    assert_eq!(status.state, ConnState::Offline);
    assert_eq!(status.attempts, 5);
    assert!(!status.is_initialized);
    assert!(status.last_error.is_some());
    assert_eq!(mock.probe_count(), 5);

    // Parked: no further attempts happen until an external trigger.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(mock.probe_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_offline_starts_fresh() {
    let (mock, _, supervisor) = setup();
    mock.fail_probes(5);
    supervisor.reconnect().await;
    assert_eq!(supervisor.current().state, ConnState::Offline);

    supervisor.reconnect().await;
    assert_eq!(supervisor.current().state, ConnState::Connected);
}

#[tokio::test]
async fn reconnect_reattaches_subscriptions() {
    let (mock, registry, supervisor) = setup();
    let mut handle = registry.subscribe(path("entities/u1"));

    supervisor.reconnect().await;
    assert_eq!(mock.live_channel_count("entities/u1"), 1);

    mock.push_snapshot("entities/u1", json!({"coins": 7}));
    let user = handle.recv().await.unwrap().unwrap();
    assert_eq!(user["coins"], json!(7));
}

#[tokio::test(start_paused = true)]
async fn failed_channel_reopen_counts_as_a_failed_attempt() {
    let (mock, registry, supervisor) = setup();
    let _handle = registry.subscribe(path("entities/u1"));
    mock.fail_opens(1);

    supervisor.reconnect().await;
    assert_eq!(supervisor.current().state, ConnState::Connected);
    // First attempt probed fine but could not reopen the channel.
    assert_eq!(mock.probe_count(), 2);
    assert_eq!(mock.live_channel_count("entities/u1"), 1);
}

// ── offline transitions ──────────────────────────────────────────

#[tokio::test]
async fn go_offline_releases_channels() {
    let (mock, registry, supervisor) = setup();
    let _handle = registry.subscribe(path("entities/u1"));
    supervisor.reconnect().await;
    assert_eq!(mock.live_channel_count("entities/u1"), 1);

    supervisor.go_offline();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(supervisor.current().state, ConnState::Offline);
    assert_eq!(mock.live_channel_count("entities/u1"), 0);
    assert_eq!(registry.len(), 1);
}

// ── host event loop ──────────────────────────────────────────────

#[tokio::test]
async fn host_events_drive_the_state_machine() {
    let (_, _, supervisor) = setup();
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(Arc::clone(&supervisor).run(rx));
    let mut status = supervisor.status();

    tx.send(HostEvent::Online).await.unwrap();
    status
        .wait_for(|s| s.state == ConnState::Connected)
        .await
        .unwrap();

    tx.send(HostEvent::Background).await.unwrap();
    status
        .wait_for(|s| s.state == ConnState::Offline)
        .await
        .unwrap();

    tx.send(HostEvent::Foreground).await.unwrap();
    status
        .wait_for(|s| s.state == ConnState::Connected)
        .await
        .unwrap();
}
