//! Gateway session integration tests
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cord_core::events::{Connect, Disconnect, MessageCreate};
use cord_gateway::{Client, SessionState, SubConnection};
use futures_util::future::BoxFuture;
use integration_tests::*;
use serde_json::json;
use tokio::sync::mpsc;

/// Open `client` and complete Hello, Identify and Ready on the first connection
async fn ready_client(server: &mut MockServer, client: &Client, seq: u64) -> GatewayConnection {
    client.open().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();
    conn.send(hello(45_000));
    conn.expect_op(OP_IDENTIFY).await.unwrap();
    conn.send(dispatch("READY", seq, ready("abc", &["10"])));
    assert!(wait_until(|| client.session().is_ready()).await);
    conn
}

// ============================================================================
// Identify, dispatch and resume
// ============================================================================

#[tokio::test]
async fn test_identify_dispatch_and_resume_after_drop() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.add_handler(move |create: MessageCreate| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(create.0.id);
        }
    });

    client.open().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();
    conn.send(hello(45_000));

    let identify = conn.expect_op(OP_IDENTIFY).await.unwrap();
    assert_eq!(identify["d"]["token"], "Bot token");
    assert_eq!(identify["d"]["large_threshold"], 250);
    assert!(identify["d"].get("shard").is_none());

    conn.send(dispatch("READY", 1, ready("abc", &["10"])));
    conn.send(dispatch("MESSAGE_CREATE", 5, message("100", "10", "hello")));

    let id = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(id, "100");
    assert_eq!(client.message("10", "100").unwrap().content, "hello");
    assert_eq!(client.session().session_id(), "abc");
    assert_eq!(client.session().sequence(), 5);
    assert_eq!(client.session().state(), SessionState::Connected);

    conn.drop_socket();

    let mut conn = server.next_connection().await.unwrap();
    let resume = conn.expect_op(OP_RESUME).await.unwrap();
    assert_eq!(resume["d"]["token"], "Bot token");
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 5);

    conn.send(dispatch("RESUMED", 6, json!({ "_trace": ["gw-1"] })));
    assert!(wait_until(|| client.session().is_ready()).await);
    assert_eq!(client.session().sequence(), 6);

    // the cache survives a resume
    assert_eq!(client.message("10", "100").unwrap().content, "hello");

    client.close().await;
}

#[tokio::test]
async fn test_reconnect_request_resumes_on_new_connection() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();
    let conn = ready_client(&mut server, &client, 3).await;

    conn.send(reconnect());

    let mut next = server.next_connection().await.unwrap();
    let resume = next.expect_op(OP_RESUME).await.unwrap();
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 3);

    client.close().await;
}

#[tokio::test]
async fn test_invalid_session_identifies_again() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();
    let mut conn = ready_client(&mut server, &client, 1).await;

    conn.send(invalid_session());
    let identify = conn.expect_op(OP_IDENTIFY).await.unwrap();
    assert_eq!(identify["d"]["token"], "Bot token");

    client.close().await;
}

// ============================================================================
// Heartbeats
// ============================================================================

#[tokio::test]
async fn test_heartbeat_carries_sequence() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();
    let mut conn = ready_client(&mut server, &client, 3).await;

    let heartbeat = conn.expect_op(OP_HEARTBEAT).await.unwrap();
    assert_eq!(heartbeat["d"], 3);

    conn.send(heartbeat_ack());
    assert!(wait_until(|| client.session().heartbeat_latency().is_some()).await);

    // op 1 from the server asks for an immediate heartbeat
    conn.send(json!({ "op": OP_HEARTBEAT }));
    let heartbeat = conn.expect_op(OP_HEARTBEAT).await.unwrap();
    assert_eq!(heartbeat["d"], 3);

    client.close().await;
}

// ============================================================================
// Status updates
// ============================================================================

#[tokio::test]
async fn test_streaming_status_update() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();
    let mut conn = ready_client(&mut server, &client, 1).await;

    client
        .update_streaming_status(0, "speedrun", "https://twitch.tv/cord")
        .await
        .unwrap();

    let update = conn.expect_op(OP_STATUS_UPDATE).await.unwrap();
    assert_eq!(update["d"]["game"]["name"], "speedrun");
    assert_eq!(update["d"]["game"]["type"], 1);
    assert_eq!(update["d"]["game"]["url"], "https://twitch.tv/cord");
    assert!(update["d"]["idle_since"].is_null());

    client.close().await;
}

// ============================================================================
// Closing
// ============================================================================

#[tokio::test]
async fn test_fatal_close_code_stops_reconnecting() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot bad-token")).unwrap();
    let conn = ready_client(&mut server, &client, 1).await;

    // 4004: authentication failed
    conn.close_with(4004);

    assert!(wait_until(|| client.session().state() == SessionState::Disconnected).await);
    assert!(server.no_connection_within(Duration::from_millis(300)).await);
    assert!(!client.session().is_open());

    client.close().await;
}

#[tokio::test]
async fn test_resumable_close_code_reconnects() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();
    let conn = ready_client(&mut server, &client, 2).await;

    // 4000: unknown error
    conn.close_with(4000);

    let mut next = server.next_connection().await.unwrap();
    let resume = next.expect_op(OP_RESUME).await.unwrap();
    assert_eq!(resume["d"]["seq"], 2);

    client.close().await;
}

#[tokio::test]
async fn test_explicit_close_emits_events_and_stays_closed() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();

    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    {
        let connects = Arc::clone(&connects);
        client.add_handler(move |_: Connect| {
            let connects = Arc::clone(&connects);
            async move {
                connects.fetch_add(1, Ordering::SeqCst);
            }
        });
        let disconnects = Arc::clone(&disconnects);
        client.add_handler(move |_: Disconnect| {
            let disconnects = Arc::clone(&disconnects);
            async move {
                disconnects.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let mut conn = ready_client(&mut server, &client, 1).await;
    assert!(wait_until(|| connects.load(Ordering::SeqCst) == 1).await);

    client.session().close().await;
    assert!(wait_until(|| disconnects.load(Ordering::SeqCst) == 1).await);
    assert!(!client.session().is_ready());
    assert_eq!(client.session().state(), SessionState::Disconnected);

    // the server sees the socket end and no reconnect follows
    assert!(conn.expect_op(u64::MAX).await.is_err());
    assert!(server.no_connection_within(Duration::from_millis(300)).await);

    client.close().await;
}

#[tokio::test]
async fn test_client_close_delivers_disconnect() {
    let mut server = MockServer::start().await.unwrap();
    let client = Client::new(server.client_config("Bot token")).unwrap();

    let disconnects = Arc::new(AtomicUsize::new(0));
    {
        let disconnects = Arc::clone(&disconnects);
        client.add_handler(move |_: Disconnect| {
            let disconnects = Arc::clone(&disconnects);
            async move {
                disconnects.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let _conn = ready_client(&mut server, &client, 1).await;
    client.close().await;

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Reconnecting
// ============================================================================

struct VoiceLink {
    id: &'static str,
    calls: mpsc::UnboundedSender<(&'static str, Instant)>,
}

impl SubConnection for VoiceLink {
    fn id(&self) -> &str {
        self.id
    }

    fn reconnect(&self) -> BoxFuture<'_, ()> {
        let _ = self.calls.send((self.id, Instant::now()));
        Box::pin(async {})
    }
}

#[tokio::test]
async fn test_sub_connections_follow_session_reconnect() {
    let mut server = MockServer::start().await.unwrap();
    let mut config = server.client_config("Bot token");
    config.gateway.sub_connection_stagger = Duration::from_millis(100);
    let client = Client::new(config).unwrap();

    let (tx, mut calls) = mpsc::unbounded_channel();
    for id in ["voice-a", "voice-b"] {
        client.add_sub_connection(Arc::new(VoiceLink {
            id,
            calls: tx.clone(),
        }));
    }

    let conn = ready_client(&mut server, &client, 4).await;
    assert!(calls.try_recv().is_err());

    conn.drop_socket();
    let mut next = server.next_connection().await.unwrap();
    next.expect_op(OP_RESUME).await.unwrap();

    let (first, at_first) = tokio::time::timeout(TIMEOUT, calls.recv()).await.unwrap().unwrap();
    let (second, at_second) = tokio::time::timeout(TIMEOUT, calls.recv()).await.unwrap().unwrap();
    assert_eq!((first, second), ("voice-a", "voice-b"));
    assert!(at_second - at_first >= Duration::from_millis(100));

    client.close().await;
}

#[tokio::test]
async fn test_failed_reconnects_back_off() {
    let mut server = MockServer::start().await.unwrap();
    let mut config = server.client_config("Bot token");
    config.gateway.reconnect_initial_delay = Duration::from_millis(100);
    config.gateway.reconnect_max_delay = Duration::from_secs(1);
    let client = Client::new(config).unwrap();
    let conn = ready_client(&mut server, &client, 2).await;

    server.reject_upgrades(2);
    let dropped_at = Instant::now();
    conn.drop_socket();

    let mut next = server.next_connection().await.unwrap();
    let waited = dropped_at.elapsed();
    next.expect_op(OP_RESUME).await.unwrap();

    // two failures: 100ms then 200ms of backoff before the third attempt
    assert_eq!(server.rejected_upgrades(), 2);
    assert!(waited >= Duration::from_millis(300));

    client.close().await;
}
