use dashlink_cache::{MemorySessionStore, SessionStore};
use dashlink_sync::transport::mock::MockRemoteStore;
use dashlink_sync::{ConnState, HostEvent, SyncClient, SyncConfig, SyncError, ready_gate};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn client() -> (Arc<MockRemoteStore>, SyncClient) {
    let mock = Arc::new(MockRemoteStore::new());
    let client = SyncClient::new(mock.clone(), SyncConfig::default());
    (mock, client)
}

async fn started(client: &SyncClient) -> mpsc::Sender<HostEvent> {
    let (gate, mut signal) = ready_gate();
    signal.set();
    client.start(gate).await.unwrap()
}

// ── startup ──────────────────────────────────────────────────────

#[tokio::test]
async fn start_connects_once_host_is_ready() {
    let (mock, client) = client();
    started(&client).await;

    assert_eq!(client.connection_status().state, ConnState::Connected);
    assert_eq!(mock.probe_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_times_out_without_ready_signal() {
    let (mock, client) = client();
    let (gate, _signal) = ready_gate();

    let err = client.start(gate).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout));
    assert_eq!(mock.probe_count(), 0);
}

// ── path validation at the facade ────────────────────────────────

#[tokio::test]
async fn subscribe_rejects_poisoned_paths() {
    let (mock, client) = client();
    started(&client).await;

    let err = client.subscribe("entities/undefined").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert_eq!(mock.live_channel_count("entities/undefined"), 0);
}

#[tokio::test]
async fn write_rejects_poisoned_paths_before_the_network() {
    let (mock, client) = client();
    started(&client).await;

    let err = client
        .write("entities/undefined", json!({"coins": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert!(mock.puts().is_empty());
}

#[tokio::test]
async fn write_rejects_bracketed_segments() {
    let (mock, client) = client();
    let err = client
        .write("entities/[object Object]", json!({"coins": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert!(mock.puts().is_empty());
}

// ── end-to-end flows ─────────────────────────────────────────────

#[tokio::test]
async fn subscribe_receives_live_mapped_snapshots() {
    let (mock, client) = client();
    started(&client).await;

    let mut profile = client.subscribe("entities/u1").await.unwrap();
    mock.push_snapshot("entities/u1", json!({"points": "120", "plan": "vip_plus"}));

    let user = profile.recv().await.unwrap().unwrap();
    assert_eq!(user["coins"], json!(120));
    assert_eq!(user["tier"], json!("vip_plus"));
}

#[tokio::test]
async fn subscribe_while_offline_serves_the_cache() {
    let (_, client) = client();
    client.write("entities/u1", json!({"coins": 5})).await.unwrap();

    // Never started, never connected; cached data still flows.
    let mut profile = client.subscribe("entities/u1").await.unwrap();
    assert_eq!(profile.recv().await, Some(Some(json!({"coins": 5}))));
    assert_eq!(client.connection_status().state, ConnState::Disconnected);
}

#[tokio::test]
async fn write_sanitizes_end_to_end() {
    let (mock, client) = client();
    started(&client).await;

    client
        .write("entities/u1", json!({"coins": "undefined", "tier": "free"}))
        .await
        .unwrap();
    assert_eq!(
        mock.puts(),
        vec![("entities/u1".to_string(), json!({"tier": "free"}))]
    );
    assert_eq!(client.cached("entities/u1"), Some(json!({"tier": "free"})));
}

#[tokio::test]
async fn update_merges_fields() {
    let (mock, client) = client();
    started(&client).await;
    client.write("entities/u1", json!({"coins": 5, "tier": "free"})).await.unwrap();

    client.update("entities/u1", json!({"tier": "vip"})).await.unwrap();
    assert_eq!(
        mock.merges(),
        vec![("entities/u1".to_string(), json!({"tier": "vip"}))]
    );
    assert_eq!(
        client.cached("entities/u1"),
        Some(json!({"coins": 5, "tier": "vip"}))
    );
}

#[tokio::test]
async fn shutdown_releases_channels_but_keeps_cache() {
    let (mock, client) = client();
    started(&client).await;
    let _profile = client.subscribe("entities/u1").await.unwrap();
    client.write("entities/u1", json!({"coins": 5})).await.unwrap();

    client.shutdown();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(client.connection_status().state, ConnState::Offline);
    assert_eq!(mock.live_channel_count("entities/u1"), 0);
    assert_eq!(client.cached("entities/u1"), Some(json!({"coins": 5})));
}

#[tokio::test]
async fn increment_routes_to_the_atomic_primitive() {
    let (mock, client) = client();
    started(&client).await;

    client.increment("entities/u1", "coins", 25).await.unwrap();
    assert_eq!(
        mock.increments(),
        vec![("entities/u1".to_string(), "coins".to_string(), 25)]
    );
}

#[tokio::test]
async fn background_then_foreground_recovers_subscriptions() {
    let (mock, client) = client();
    let events = started(&client).await;
    let mut profile = client.subscribe("entities/u1").await.unwrap();
    let mut status = client.status_watch();

    events.send(HostEvent::Background).await.unwrap();
    status
        .wait_for(|s| s.state == ConnState::Offline)
        .await
        .unwrap();

    events.send(HostEvent::Foreground).await.unwrap();
    status
        .wait_for(|s| s.state == ConnState::Connected)
        .await
        .unwrap();

    mock.push_snapshot("entities/u1", json!({"coins": 9}));
    let user = profile.recv().await.unwrap().unwrap();
    assert_eq!(user["coins"], json!(9));
}

// ── session-mirrored cache ───────────────────────────────────────

#[tokio::test]
async fn session_store_survives_a_client_rebuild() {
    let session: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let mock = Arc::new(MockRemoteStore::new());

    let first = SyncClient::with_session_store(
        mock.clone(),
        Arc::clone(&session),
        SyncConfig::default(),
    );
    first.write("entities/u1", json!({"coins": 5})).await.unwrap();
    drop(first);

    // Same session store, fresh client: simulates a page reload.
    let second =
        SyncClient::with_session_store(mock, session, SyncConfig::default());
    assert_eq!(second.cached("entities/u1"), Some(json!({"coins": 5})));
}

#[tokio::test]
async fn clear_cache_drops_everything() {
    let (_, client) = client();
    client.write("entities/u1", json!({"coins": 5})).await.unwrap();
    client.clear_cache().unwrap();
    assert_eq!(client.cached("entities/u1"), None);
}
