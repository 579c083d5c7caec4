//! Mock API and gateway server
//!
//! One axum server hosts both halves: `/api/gateway` points the client at
//! the server's own `/gateway` WebSocket route, and `/api/scripted/:route`
//! answers with responses queued by the test.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use cord_common::ClientConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long helpers wait for the client before failing the test
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A canned HTTP response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// A 429 whose body and `Retry-After` header both carry `retry_after`
    pub fn rate_limited(retry_after: f64, global: bool) -> Self {
        let mut response = Self {
            status: 429,
            headers: vec![("retry-after", retry_after.to_string())],
            body: json!({
                "message": "You are being rate limited.",
                "retry_after": retry_after,
                "global": global,
            })
            .to_string(),
        };
        if global {
            response.headers.push(("x-ratelimit-global", "true".to_string()));
        }
        response
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    rejected_upgrades: Arc<AtomicUsize>,
    upgrades_to_reject: Arc<AtomicUsize>,
    connections: mpsc::UnboundedSender<GatewayConnection>,
}

/// In-process server standing in for the API and the gateway
pub struct MockServer {
    pub addr: SocketAddr,
    state: MockState,
    connections: mpsc::UnboundedReceiver<GatewayConnection>,
    _handle: JoinHandle<()>,
}

impl MockServer {
    /// Start on an ephemeral port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (connections_tx, connections) = mpsc::unbounded_channel();

        let state = MockState {
            addr,
            routes: Arc::default(),
            hits: Arc::default(),
            rejected_upgrades: Arc::default(),
            upgrades_to_reject: Arc::default(),
            connections: connections_tx,
        };

        let app = Router::new()
            .route("/api/gateway", get(gateway_url))
            .route("/api/scripted/:route", any(scripted))
            .route("/gateway", get(gateway_socket))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            connections,
            _handle: handle,
        })
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// URL of a scripted route
    pub fn scripted_url(&self, route: &str) -> String {
        format!("{}/scripted/{route}", self.api_base())
    }

    /// Queue responses for `route`; the last one repeats once the rest are used
    pub fn script(&self, route: &str, responses: impl IntoIterator<Item = MockResponse>) {
        self.state
            .routes
            .lock()
            .entry(route.to_string())
            .or_default()
            .extend(responses);
    }

    /// Requests received on `route`
    pub fn hits(&self, route: &str) -> usize {
        self.state.hits.lock().get(route).copied().unwrap_or(0)
    }

    /// Answer the next `count` gateway upgrade requests with 503
    pub fn reject_upgrades(&self, count: usize) {
        self.state.upgrades_to_reject.store(count, Ordering::SeqCst);
    }

    /// Gateway upgrade requests answered with 503 so far
    pub fn rejected_upgrades(&self) -> usize {
        self.state.rejected_upgrades.load(Ordering::SeqCst)
    }

    /// Client config pointed at this server, with short reconnect timings
    pub fn client_config(&self, token: &str) -> ClientConfig {
        let mut config = ClientConfig::new(token);
        config.rest = config.rest.with_api_base(self.api_base());
        config.gateway.reconnect_initial_delay = Duration::from_millis(20);
        config.gateway.reconnect_max_delay = Duration::from_millis(200);
        config.gateway.close_grace = Duration::from_millis(10);
        config.gateway.sub_connection_stagger = Duration::from_millis(10);
        config
    }

    /// Wait for the client to open the next gateway connection
    pub async fn next_connection(&mut self) -> Result<GatewayConnection> {
        tokio::time::timeout(TIMEOUT, self.connections.recv())
            .await
            .context("timed out waiting for a gateway connection")?
            .context("mock server stopped")
    }

    /// Whether no gateway connection arrives within `wait`
    pub async fn no_connection_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.connections.recv()).await.is_err()
    }
}

async fn gateway_url(State(state): State<MockState>) -> Json<Value> {
    Json(json!({ "url": format!("ws://{}/gateway", state.addr) }))
}

async fn scripted(State(state): State<MockState>, Path(route): Path<String>) -> Response {
    *state.hits.lock().entry(route.clone()).or_default() += 1;

    let next = {
        let mut routes = state.routes.lock();
        routes.get_mut(&route).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };

    match next {
        Some(response) => response.into_response(),
        None => MockResponse::ok(json!({})).into_response(),
    }
}

async fn gateway_socket(State(state): State<MockState>, ws: WebSocketUpgrade) -> Response {
    let reject = state
        .upgrades_to_reject
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if reject {
        state.rejected_upgrades.fetch_add(1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| serve_connection(state, socket))
}

enum ServerFrame {
    Payload(Value),
    Close(u16),
    Drop,
}

async fn serve_connection(state: MockState, mut socket: WebSocket) {
    let (received_tx, received) = mpsc::unbounded_channel();
    let (outgoing, mut commands) = mpsc::unbounded_channel();
    if state
        .connections
        .send(GatewayConnection { received, outgoing })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(&text) {
                        let _ = received_tx.send(value);
                    }
                }
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Some(ServerFrame::Payload(value)) => {
                    if socket.send(WsMessage::Text(value.to_string())).await.is_err() {
                        return;
                    }
                }
                Some(ServerFrame::Close(code)) => {
                    let frame = CloseFrame { code, reason: "closed by test".into() };
                    let _ = socket.send(WsMessage::Close(Some(frame))).await;
                }
                // dropping the socket ends the TCP stream without a close frame
                Some(ServerFrame::Drop) | None => return,
            },
        }
    }
}

/// Server end of one client gateway connection
pub struct GatewayConnection {
    received: mpsc::UnboundedReceiver<Value>,
    outgoing: mpsc::UnboundedSender<ServerFrame>,
}

impl GatewayConnection {
    /// Send a gateway payload to the client
    pub fn send(&self, payload: Value) {
        let _ = self.outgoing.send(ServerFrame::Payload(payload));
    }

    /// Send a close frame with `code`
    pub fn close_with(&self, code: u16) {
        let _ = self.outgoing.send(ServerFrame::Close(code));
    }

    /// Drop the socket without a closing handshake
    pub fn drop_socket(self) {
        let _ = self.outgoing.send(ServerFrame::Drop);
    }

    /// Next frame the client sent
    pub async fn next_frame(&mut self) -> Result<Value> {
        tokio::time::timeout(TIMEOUT, self.received.recv())
            .await
            .context("timed out waiting for a client frame")?
            .context("client connection closed")
    }

    /// Next frame with op code `op`, skipping any others
    pub async fn expect_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self.next_frame().await?;
            match frame.get("op").and_then(Value::as_u64) {
                Some(found) if found == op => return Ok(frame),
                Some(_) => continue,
                None => bail!("frame without op code: {frame}"),
            }
        }
    }
}

/// Poll `condition` until it holds or [`TIMEOUT`] passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
