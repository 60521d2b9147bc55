// Integration tests for `SyncCoordinator`: wiremock for the pull API and an
// in-process WebSocket server for the push channel.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigia_core::{
    AlertId, AlertStatus, CoreError, HubEvent, Partition, ReconnectConfig, SyncConfig,
    SyncCoordinator, SyncState, Topic,
};

const WAIT: Duration = Duration::from_secs(10);

// ── Helpers ─────────────────────────────────────────────────────────

fn alert_json(id: i64, status: &str, priority: &str) -> Value {
    json!({
        "id": id,
        "type": "intrusion",
        "priority": priority,
        "status": status,
        "timestamp": 1_760_000_000 + id,
        "location": format!("Zone {id}"),
        "camera_id": id,
        "message": "Person detected"
    })
}

fn snapshot_alerts() -> Value {
    json!([
        alert_json(1, "new", "high"),
        alert_json(2, "in_progress", "medium"),
        alert_json(3, "new", "low"),
    ])
}

fn config_for(server: &MockServer) -> SyncConfig {
    let mut config = SyncConfig::new(Url::parse(&format!("{}/api", server.uri())).unwrap());
    config.websocket_enabled = false;
    config.poll_interval_secs = 1;
    config.refresh_interval_secs = 0;
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 1.5,
        max_attempts: Some(0),
    };
    config
}

async fn mount_active(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/alerts/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// In-process push server.
///
/// Serves one session per entry of `snapshots`, in order. Each session
/// answers every `get_active_alerts` with its snapshot and counts the
/// answers on `served`; sessions after the first wait `reply_delay` before
/// answering. Frames sent on `frames` are forwarded to the connected
/// client, and `close_session()` makes the server close the current session
/// and wait for the next connection.
struct PushServer {
    url: Url,
    frames: mpsc::UnboundedSender<String>,
    close: mpsc::UnboundedSender<()>,
    served: watch::Receiver<usize>,
}

impl PushServer {
    fn push(&self, frame: Value) {
        self.frames.send(frame.to_string()).unwrap();
    }

    fn close_session(&self) {
        self.close.send(()).unwrap();
    }
}

async fn push_server(snapshot: Value) -> PushServer {
    push_server_sessions(vec![snapshot], Duration::ZERO).await
}

async fn push_server_sessions(snapshots: Vec<Value>, reply_delay: Duration) -> PushServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frames, mut frames_rx) = mpsc::unbounded_channel::<String>();
    let (close, mut close_rx) = mpsc::unbounded_channel::<()>();
    let (served_tx, served) = watch::channel(0_usize);

    tokio::spawn(async move {
        for (session, snapshot) in snapshots.into_iter().enumerate() {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let delay = if session == 0 { Duration::ZERO } else { reply_delay };

            loop {
                tokio::select! {
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let request: Value = serde_json::from_str(text.as_str()).unwrap();
                            if request["type"] == "get_active_alerts" {
                                tokio::time::sleep(delay).await;
                                let reply = json!({ "type": "active_alerts", "alerts": snapshot });
                                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                                served_tx.send_modify(|n| *n += 1);
                            }
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    Some(frame) = frames_rx.recv() => {
                        if ws.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(()) = close_rx.recv() => {
                        let _ = ws.close(None).await;
                        break;
                    }
                }
            }
        }
    });

    PushServer {
        url: Url::parse(&format!("ws://{addr}/ws/alerts")).unwrap(),
        frames,
        close,
        served,
    }
}

/// Push server that completes the handshake after `handshake_delay` and
/// never answers snapshot requests. Counts the requests it received.
async fn silent_push_server(handshake_delay: Duration) -> (Url, watch::Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (requested_tx, requested) = watch::channel(0_usize);

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        tokio::time::sleep(handshake_delay).await;
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let request: Value = serde_json::from_str(text.as_str()).unwrap();
                if request["type"] == "get_active_alerts" {
                    requested_tx.send_modify(|n| *n += 1);
                }
            }
        }
    });

    (
        Url::parse(&format!("ws://{addr}/ws/alerts")).unwrap(),
        requested,
    )
}

async fn dead_push_url() -> Url {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    Url::parse(&format!("ws://{addr}/ws/alerts")).unwrap()
}

async fn wait_for_state(coordinator: &SyncCoordinator, wanted: SyncState) {
    let mut rx = coordinator.sync_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == wanted))
        .await
        .unwrap()
        .unwrap();
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

/// Record every state the coordinator moves through from now on.
fn record_states(coordinator: &SyncCoordinator) -> Arc<Mutex<Vec<SyncState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut rx = coordinator.sync_state();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            sink.lock().unwrap().push(state);
        }
    });
    seen
}

fn active_ids(coordinator: &SyncCoordinator) -> Vec<String> {
    coordinator
        .store()
        .active()
        .iter()
        .map(|a| a.id.to_string())
        .collect()
}

fn record_topics(coordinator: &SyncCoordinator) -> Arc<Mutex<Vec<Topic>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = coordinator.hub().subscribe_all(move |event: &HubEvent| {
        sink.lock().unwrap().push(event.topic());
        Ok(())
    });
    seen
}

// ── Pull-only lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn test_start_without_push_loads_snapshot_and_degrades() {
    let server = MockServer::start().await;
    mount_active(&server, snapshot_alerts()).await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    let topics = record_topics(&coordinator);

    coordinator.start().await.unwrap();

    assert_eq!(coordinator.state(), SyncState::Degraded);
    let ids: Vec<String> = coordinator
        .store()
        .active()
        .iter()
        .map(|a| a.id.to_string())
        .collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
    assert!(coordinator.last_snapshot().is_some());
    assert_eq!(*topics.lock().unwrap(), vec![Topic::Load]);

    let stats = coordinator.statistics();
    assert_eq!(stats.active, 3);
    assert_eq!(stats.by_priority.high, 1);

    coordinator.stop().await;
    assert_eq!(coordinator.state(), SyncState::Stopped);
    assert_eq!(coordinator.hub().listener_count(), 0);
}

#[tokio::test]
async fn test_initial_snapshot_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/active"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    let err = coordinator.start().await.unwrap_err();

    assert!(matches!(err, CoreError::SnapshotLoad { .. }), "got {err:?}");
    assert_eq!(coordinator.state(), SyncState::Degraded);
    assert_eq!(coordinator.store().active_count(), 0);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_degraded_poll_recovers_after_failed_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/active"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_active(&server, snapshot_alerts()).await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    assert!(coordinator.start().await.is_err());

    let store = Arc::clone(coordinator.store());
    wait_until(|| store.active_count() == 3).await;

    coordinator.stop().await;
}

// ── Push channel ────────────────────────────────────────────────────

fn push_config(server: &MockServer, push_url: &Url) -> SyncConfig {
    let mut config = config_for(server);
    config.websocket_enabled = true;
    config.push_url = Some(push_url.clone());
    config
}

async fn live_coordinator(server: &MockServer, push: &PushServer) -> SyncCoordinator {
    start_live(push_config(server, &push.url), push).await
}

async fn start_live(config: SyncConfig, push: &PushServer) -> SyncCoordinator {
    let coordinator = SyncCoordinator::new(config).unwrap();
    coordinator.start().await.unwrap();

    // The initial pull is done once start() returns; wait for the pushed
    // snapshot so later frames cannot race with it.
    let mut served = push.served.clone();
    tokio::time::timeout(WAIT, served.wait_for(|n| *n >= 1))
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&coordinator, SyncState::Live).await;
    coordinator
}

#[tokio::test]
async fn test_push_snapshot_brings_coordinator_live() {
    let server = MockServer::start().await;
    mount_active(&server, snapshot_alerts()).await;
    let push = push_server(snapshot_alerts()).await;

    let coordinator = live_coordinator(&server, &push).await;

    assert_eq!(coordinator.store().active_count(), 3);
    assert_eq!(
        *coordinator.connection_state().borrow(),
        vigia_core::ConnectionState::Open
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_pushed_new_alert_lands_in_active() {
    let server = MockServer::start().await;
    mount_active(&server, json!([])).await;
    let push = push_server(json!([])).await;
    let coordinator = live_coordinator(&server, &push).await;
    let topics = record_topics(&coordinator);

    push.push(json!({ "type": "new_alert", "alert": alert_json(101, "new", "high") }));

    let store = Arc::clone(coordinator.store());
    wait_until(|| store.get(&AlertId::from("101")).is_some()).await;

    assert_eq!(
        store.partition_of(&AlertId::from("101")),
        Some(Partition::Active)
    );
    assert_eq!(store.active()[0].id.as_str(), "101");
    assert_eq!(coordinator.statistics().by_priority.high, 1);
    assert_eq!(*topics.lock().unwrap(), vec![Topic::New]);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_pushed_update_settles_alert() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(7, "new", "medium")])).await;
    let push = push_server(json!([alert_json(7, "new", "medium")])).await;
    let coordinator = live_coordinator(&server, &push).await;
    let topics = record_topics(&coordinator);

    push.push(json!({ "type": "update_alert", "alert": alert_json(7, "resolved", "medium") }));

    let store = Arc::clone(coordinator.store());
    wait_until(|| store.partition_of(&AlertId::from("7")) == Some(Partition::Settled)).await;

    assert_eq!(
        store.get(&AlertId::from("7")).unwrap().status,
        AlertStatus::Resolved
    );
    assert_eq!(store.active_count(), 0);
    assert_eq!(*topics.lock().unwrap(), vec![Topic::Update]);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_reopened_alert_returns_to_front_of_queue() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(1, "new", "low"), alert_json(2, "new", "low")])).await;
    let push = push_server(json!([alert_json(1, "new", "low"), alert_json(2, "new", "low")])).await;
    let coordinator = live_coordinator(&server, &push).await;
    let store = Arc::clone(coordinator.store());

    push.push(json!({ "type": "update_alert", "alert": alert_json(1, "resolved", "low") }));
    wait_until(|| store.partition_of(&AlertId::from("1")) == Some(Partition::Settled)).await;

    push.push(json!({ "type": "update_alert", "alert": alert_json(1, "in_progress", "low") }));
    wait_until(|| store.partition_of(&AlertId::from("1")) == Some(Partition::Active)).await;

    let ids: Vec<String> = store.active().iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(store.settled_count(), 0);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_invalid_push_frame_does_not_disturb_store() {
    let server = MockServer::start().await;
    mount_active(&server, json!([])).await;
    let push = push_server(json!([])).await;
    let coordinator = live_coordinator(&server, &push).await;

    push.push(json!({ "type": "new_alert", "alert": alert_json(1, "new", "urgent") }));
    push.push(json!({ "type": "new_alert", "alert": alert_json(2, "new", "high") }));

    let store = Arc::clone(coordinator.store());
    wait_until(|| store.get(&AlertId::from("2")).is_some()).await;

    assert!(store.get(&AlertId::from("1")).is_none());
    assert_eq!(coordinator.state(), SyncState::Live);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_channel_drop_degrades_then_resyncs_on_reopen() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(1, "new", "high")])).await;
    let push = push_server_sessions(
        vec![
            json!([alert_json(1, "new", "high")]),
            json!([alert_json(2, "new", "low"), alert_json(3, "in_progress", "medium")]),
        ],
        Duration::from_millis(200),
    )
    .await;

    let mut config = push_config(&server, &push.url);
    // Keep the poll out of the way: only the push channel resyncs here.
    config.poll_interval_secs = 60;
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(300),
        max_delay: Duration::from_secs(1),
        multiplier: 1.5,
        max_attempts: Some(3),
    };
    let coordinator = start_live(config, &push).await;
    assert_eq!(active_ids(&coordinator), vec!["1"]);
    let states = record_states(&coordinator);

    push.close_session();
    wait_for_state(&coordinator, SyncState::Degraded).await;

    // The store is re-snapshotted from the second session.
    wait_until(|| active_ids(&coordinator) == vec!["3", "2"]).await;
    wait_for_state(&coordinator, SyncState::Live).await;
    wait_until(|| states.lock().unwrap().last() == Some(&SyncState::Live)).await;

    assert_eq!(
        *states.lock().unwrap(),
        vec![SyncState::Degraded, SyncState::SyncingSnapshot, SyncState::Live]
    );
    assert_eq!(
        *coordinator.connection_state().borrow(),
        vigia_core::ConnectionState::Open
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_unanswered_push_snapshot_falls_back_to_poll() {
    let server = MockServer::start().await;
    mount_active(&server, snapshot_alerts()).await;
    // The handshake completes well after start()'s own pull, so the
    // snapshot request sent on connect is the one left unanswered.
    let (push_url, mut requested) = silent_push_server(Duration::from_millis(300)).await;

    let coordinator = SyncCoordinator::new(push_config(&server, &push_url)).unwrap();
    coordinator.start().await.unwrap();
    let pulls_at_start = server.received_requests().await.unwrap().len();

    tokio::time::timeout(WAIT, requested.wait_for(|n| *n >= 1))
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&coordinator, SyncState::Live).await;

    assert!(server.received_requests().await.unwrap().len() > pulls_at_start);
    assert_eq!(coordinator.store().active_count(), 3);

    coordinator.stop().await;
}

/// A poll applied while degraded produces the same store state as the
/// same snapshot pushed over a live channel.
#[tokio::test]
async fn test_polled_snapshot_matches_pushed_snapshot() {
    // Live coordinator: snapshot arrives over the push channel.
    let live_server = MockServer::start().await;
    mount_active(&live_server, snapshot_alerts()).await;
    let push = push_server(snapshot_alerts()).await;
    let live = live_coordinator(&live_server, &push).await;

    // Degraded coordinator: push channel unreachable, first pull empty,
    // the poll then brings the same snapshot.
    let degraded_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&degraded_server)
        .await;
    mount_active(&degraded_server, snapshot_alerts()).await;
    let mut degraded_config = config_for(&degraded_server);
    degraded_config.websocket_enabled = true;
    degraded_config.push_url = Some(dead_push_url().await);

    let degraded = SyncCoordinator::new(degraded_config).unwrap();
    degraded.start().await.unwrap();
    wait_for_state(&degraded, SyncState::Degraded).await;

    let store = Arc::clone(degraded.store());
    wait_until(|| store.active_count() == 3).await;

    assert_eq!(live.store().active(), degraded.store().active());
    assert_eq!(live.statistics(), degraded.statistics());

    live.stop().await;
    degraded.stop().await;
}

// ── Pull operations ─────────────────────────────────────────────────

#[tokio::test]
async fn test_load_history_publishes_page() {
    let server = MockServer::start().await;
    mount_active(&server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alerts": [alert_json(10, "resolved", "low"), alert_json(11, "false_alarm", "low")],
            "total": 5
        })))
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();
    let topics = record_topics(&coordinator);

    let page = coordinator.load_history(1, 2).await.unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.alerts.len(), 2);
    assert_eq!(page.page_count(), 3);
    assert_eq!(*topics.lock().unwrap(), vec![Topic::History]);
    // History is not stored.
    assert_eq!(coordinator.store().settled_count(), 0);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_fetch_alert_applies_update() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(5, "new", "high")])).await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alert_json(5, "acknowledged", "high")))
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();

    let alert = coordinator.fetch_alert(&AlertId::from("5")).await.unwrap();

    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert_eq!(
        coordinator.store().partition_of(&AlertId::from("5")),
        Some(Partition::Settled)
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_fetch_missing_alert_is_not_found() {
    let server = MockServer::start().await;
    mount_active(&server, json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();

    let err = coordinator
        .fetch_alert(&AlertId::from("404"))
        .await
        .unwrap_err();
    match err {
        CoreError::AlertNotFound { id } => assert_eq!(id, "404"),
        other => panic!("expected AlertNotFound, got {other:?}"),
    }

    coordinator.stop().await;
}

#[tokio::test]
async fn test_action_in_flight_at_stop_is_discarded() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(101, "new", "high")])).await;
    Mock::given(method("POST"))
        .and(path("/api/alerts/101/actions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "success": true,
                    "alert": alert_json(101, "acknowledged", "high")
                }))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();
    let store = Arc::clone(coordinator.store());
    let before = store.snapshot().version;

    let dispatcher = coordinator.dispatcher().clone();
    let in_flight =
        tokio::spawn(async move { dispatcher.acknowledge(&AlertId::from("101"), None).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    coordinator.stop().await;

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Stopped), "got {err:?}");
    assert_eq!(store.snapshot().version, before);
    assert_eq!(
        store.get(&AlertId::from("101")).unwrap().status,
        AlertStatus::New
    );
    assert_eq!(
        store.partition_of(&AlertId::from("101")),
        Some(Partition::Active)
    );
}

#[tokio::test]
async fn test_fetch_in_flight_at_stop_is_discarded() {
    let server = MockServer::start().await;
    mount_active(&server, json!([alert_json(5, "new", "high")])).await;
    Mock::given(method("GET"))
        .and(path("/api/alerts/5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(alert_json(5, "resolved", "high"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();

    let fetching = coordinator.clone();
    let in_flight =
        tokio::spawn(async move { fetching.fetch_alert(&AlertId::from("5")).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    coordinator.stop().await;

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Stopped), "got {err:?}");
    assert_eq!(
        coordinator.store().partition_of(&AlertId::from("5")),
        Some(Partition::Active)
    );
}

#[tokio::test]
async fn test_operations_after_stop_are_rejected() {
    let server = MockServer::start().await;
    mount_active(&server, json!([])).await;

    let coordinator = SyncCoordinator::new(config_for(&server)).unwrap();
    coordinator.start().await.unwrap();
    coordinator.stop().await;

    assert!(matches!(
        coordinator.load_history(1, 10).await,
        Err(CoreError::Stopped)
    ));
    assert!(matches!(coordinator.start().await, Err(CoreError::Stopped)));
}
