//! Gateway session
//!
//! One session owns at most one WebSocket connection at a time. Opening
//! resolves the gateway URL, connects, then identifies or resumes. A read
//! loop decodes frames in order and feeds dispatches to the [`Dispatcher`];
//! a heartbeat loop starts once the session is ready. When the connection
//! breaks the read loop closes it and reconnects with exponential backoff.
//!
//! Both loops watch a per-connection stop signal so that an explicit close
//! ends them without triggering a reconnect. Every connection gets an id,
//! and a loop only tears down the connection it was started for.

mod backoff;
mod heartbeat;
mod sub_connection;

pub use backoff::Backoff;
pub use sub_connection::SubConnection;

use cord_common::{GatewayConfig, TaskSupervisor};
use cord_core::events::{Connect, Disconnect};
use cord_core::Event;
use cord_http::RestClient;
use flate2::read::ZlibDecoder;
use futures::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, ACCEPT_ENCODING};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    CloseCode, GatewayPayload, IdentifyPayload, IdentifyProperties, OpCode, ResumePayload,
    StatusUpdatePayload,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Used when neither Hello nor Ready announced an interval
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(41_250);

/// Lifecycle of a gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Identify sent, waiting for Ready
    Identifying,
    /// Resume sent, waiting for Resumed
    Resuming,
    Connected,
    /// Waiting out the backoff between connection attempts
    Reconnecting,
}

struct Writer {
    conn_id: u64,
    sink: WsSink,
}

/// Why a read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenExit {
    /// The stop signal fired; whoever fired it owns the teardown
    Stopped,
    /// Read error, end of stream, or a recoverable close from the server
    ConnectionLost,
    /// The server closed with a code that makes retrying pointless
    Fatal,
    /// The server sent op 7
    ReconnectRequested,
}

/// A gateway connection and its session bookkeeping
pub struct GatewaySession {
    config: GatewayConfig,
    rest: Arc<RestClient>,
    dispatcher: Arc<Dispatcher>,
    supervisor: Arc<TaskSupervisor>,

    /// Serializes open, close and connection-loss handling
    lifecycle: tokio::sync::Mutex<()>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    /// Id of the live connection, 0 when there is none
    current_conn: AtomicU64,
    next_conn: AtomicU64,
    /// Set by an explicit close, cleared by an explicit open
    closing: AtomicBool,

    state: RwLock<SessionState>,
    session_id: RwLock<String>,
    sequence: AtomicU64,
    gateway_url: RwLock<Option<String>>,
    data_ready: AtomicBool,

    /// Dropped to stop the read and heartbeat loops
    listening: Mutex<Option<watch::Sender<()>>>,
    heartbeat: Mutex<Option<AbortHandle>>,
    /// Milliseconds, from the last Hello
    hello_interval: AtomicU64,
    last_heartbeat_sent: RwLock<Option<Instant>>,
    last_heartbeat_ack: RwLock<Option<Instant>>,

    sub_connections: RwLock<Vec<Arc<dyn SubConnection>>>,
}

impl GatewaySession {
    pub fn new(
        config: GatewayConfig,
        rest: Arc<RestClient>,
        dispatcher: Arc<Dispatcher>,
        supervisor: Arc<TaskSupervisor>,
    ) -> Self {
        Self {
            config,
            rest,
            dispatcher,
            supervisor,
            lifecycle: tokio::sync::Mutex::new(()),
            writer: tokio::sync::Mutex::new(None),
            current_conn: AtomicU64::new(0),
            next_conn: AtomicU64::new(1),
            closing: AtomicBool::new(false),
            state: RwLock::new(SessionState::Disconnected),
            session_id: RwLock::new(String::new()),
            sequence: AtomicU64::new(0),
            gateway_url: RwLock::new(None),
            data_ready: AtomicBool::new(false),
            listening: Mutex::new(None),
            heartbeat: Mutex::new(None),
            hello_interval: AtomicU64::new(0),
            last_heartbeat_sent: RwLock::new(None),
            last_heartbeat_ack: RwLock::new(None),
            sub_connections: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Session id from the last Ready, empty before the first one
    pub fn session_id(&self) -> String {
        self.session_id.read().clone()
    }

    /// Sequence number of the last dispatch received
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// True between Ready/Resumed and the next close or failed heartbeat
    pub fn is_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.current_conn.load(Ordering::Acquire) != 0
    }

    /// Register a resource to reconnect after the session reconnects
    pub fn add_sub_connection(&self, sub: Arc<dyn SubConnection>) {
        self.sub_connections.write().push(sub);
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "session state changed");
        }
    }

    // ------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------

    /// Connect and identify, or resume when a previous session exists
    pub async fn open(self: &Arc<Self>) -> GatewayResult<()> {
        self.closing.store(false, Ordering::Release);
        self.open_connection().await
    }

    async fn open_connection(self: &Arc<Self>) -> GatewayResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.supervisor.is_closed() || self.closing.load(Ordering::Acquire) {
            return Err(GatewayError::ShutDown);
        }
        if self.writer.lock().await.is_some() {
            return Err(GatewayError::AlreadyOpen);
        }

        self.set_state(SessionState::Connecting);
        let result = self.connect().await;
        if result.is_err() && self.writer.lock().await.is_none() {
            self.set_state(SessionState::Disconnected);
        }
        result
    }

    async fn connect(self: &Arc<Self>) -> GatewayResult<()> {
        let gateway = self.gateway_url().await?;
        let url = format!("{gateway}?v={}&encoding=json", self.config.version);
        info!(%url, "connecting to gateway");

        let mut request = url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("zlib"));

        let stream = match connect_async(request).await {
            Ok((stream, _)) => stream,
            Err(err) => {
                // The URL may have moved; resolve it again next time
                *self.gateway_url.write() = None;
                return Err(err.into());
            }
        };

        let (sink, source) = stream.split();
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);
        *self.writer.lock().await = Some(Writer { conn_id, sink });
        self.current_conn.store(conn_id, Ordering::Release);

        let (stop_tx, stop_rx) = watch::channel(());
        *self.listening.lock() = Some(stop_tx);

        let session_id = self.session_id();
        let sequence = self.sequence();
        let sent = if !session_id.is_empty() && sequence > 0 {
            self.resume(conn_id, session_id, sequence).await
        } else {
            self.identify(conn_id).await
        };
        if let Err(err) = sent {
            self.close_connection().await;
            return Err(err);
        }

        self.dispatcher.dispatch(Connect.into());

        if self
            .supervisor
            .spawn(Arc::clone(self).listen(conn_id, source, stop_rx))
            .is_none()
        {
            self.close_connection().await;
            return Err(GatewayError::ShutDown);
        }
        Ok(())
    }

    /// Cached gateway URL, resolved over REST on first use
    async fn gateway_url(&self) -> GatewayResult<String> {
        let cached = self.gateway_url.read().clone();
        if let Some(url) = cached {
            return Ok(url);
        }

        let url = self.rest.gateway().await?;
        debug!(%url, "gateway url resolved");
        *self.gateway_url.write() = Some(url.clone());
        Ok(url)
    }

    fn identify_payload(&self) -> GatewayResult<IdentifyPayload> {
        let (shard_id, shard_count) = (self.config.shard_id, self.config.shard_count);

        let shard = if shard_count > 1 {
            if shard_id >= shard_count {
                return Err(GatewayError::InvalidShard {
                    shard_id,
                    shard_count,
                });
            }
            Some([shard_id, shard_count])
        } else {
            None
        };

        Ok(IdentifyPayload {
            token: self.config.token.clone(),
            properties: IdentifyProperties::new(),
            compress: self.config.compress,
            large_threshold: self.config.large_threshold,
            shard,
        })
    }

    async fn identify(&self, conn_id: u64) -> GatewayResult<()> {
        let frame = GatewayPayload::identify(&self.identify_payload()?)?;
        self.set_state(SessionState::Identifying);
        debug!("sending identify");
        self.send(Some(conn_id), &frame).await
    }

    async fn resume(&self, conn_id: u64, session_id: String, seq: u64) -> GatewayResult<()> {
        info!(%session_id, seq, "resuming session");
        let frame = GatewayPayload::resume(&ResumePayload {
            token: self.config.token.clone(),
            session_id,
            seq,
        })?;
        self.set_state(SessionState::Resuming);
        self.send(Some(conn_id), &frame).await
    }

    /// Write one frame
    ///
    /// With `conn_id` set, fails unless that connection is still the live one.
    async fn send(&self, conn_id: Option<u64>, frame: &GatewayPayload) -> GatewayResult<()> {
        let text = frame.to_json()?;
        let mut writer = self.writer.lock().await;
        let writer = match writer.as_mut() {
            Some(writer) if conn_id.map_or(true, |id| id == writer.conn_id) => writer,
            _ => return Err(GatewayError::NoConnection),
        };

        trace!(op = %frame.op, "sending frame");
        writer.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Set the game shown for this session
    ///
    /// `idle_since` is a Unix timestamp in milliseconds, or 0 when not idle.
    /// An empty `game` clears it.
    pub async fn update_status(&self, idle_since: i64, game: &str) -> GatewayResult<()> {
        self.update_streaming_status(idle_since, game, "").await
    }

    /// Like [`update_status`](Self::update_status), shown as streaming at `url`
    pub async fn update_streaming_status(
        &self,
        idle_since: i64,
        game: &str,
        url: &str,
    ) -> GatewayResult<()> {
        let payload = StatusUpdatePayload::new(idle_since, game, url);
        self.send(None, &GatewayPayload::status_update(&payload)?).await
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    async fn listen(self: Arc<Self>, conn_id: u64, mut source: WsSource, mut stop: watch::Receiver<()>) {
        debug!(conn_id, "read loop started");

        let exit = loop {
            let message = tokio::select! {
                biased;
                _ = stop.changed() => break ListenExit::Stopped,
                message = source.next() => message,
            };

            let bytes = match message {
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(data))) => match inflate(&data) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!(error = %err, "error decompressing gateway frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => break on_server_close(frame.as_ref()),
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    warn!(error = %err, "error reading from gateway websocket");
                    break ListenExit::ConnectionLost;
                }
                None => {
                    warn!("gateway websocket stream ended");
                    break ListenExit::ConnectionLost;
                }
            };

            if let Some(exit) = self.on_frame(conn_id, &bytes).await {
                break exit;
            }
        };

        debug!(conn_id, ?exit, "read loop ended");
        if exit != ListenExit::Stopped {
            self.on_connection_lost(conn_id, exit).await;
        }
    }

    /// Handle one decoded frame; `Some` ends the read loop
    async fn on_frame(self: &Arc<Self>, conn_id: u64, bytes: &[u8]) -> Option<ListenExit> {
        let frame = match GatewayPayload::from_slice(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                error!(error = %err, "error decoding gateway frame");
                return None;
            }
        };
        trace!(%frame, "received frame");

        match frame.op {
            OpCode::Dispatch => self.on_dispatch(conn_id, frame),
            OpCode::Heartbeat => {
                debug!("sending heartbeat in response to op 1");
                if let Err(err) = self.send_heartbeat(conn_id).await {
                    error!(error = %err, "error sending requested heartbeat");
                }
            }
            OpCode::Reconnect => {
                info!("closing and reconnecting in response to op 7");
                return Some(ListenExit::ReconnectRequested);
            }
            OpCode::InvalidSession => {
                warn!("sending identify in response to op 9");
                if let Err(err) = self.identify(conn_id).await {
                    error!(error = %err, "error sending identify in response to op 9");
                }
            }
            OpCode::Hello => {
                if let Some(hello) = frame.as_hello() {
                    debug!(interval_ms = hello.heartbeat_interval, "hello received");
                    self.hello_interval
                        .store(hello.heartbeat_interval, Ordering::Release);
                }
            }
            OpCode::HeartbeatAck => {
                *self.last_heartbeat_ack.write() = Some(Instant::now());
            }
            other => warn!(op = %other, "unexpected op code from gateway"),
        }
        None
    }

    fn on_dispatch(self: &Arc<Self>, conn_id: u64, frame: GatewayPayload) {
        let Some(event_type) = frame.t else {
            warn!("dispatch without an event type");
            return;
        };

        if let Some(seq) = frame.s {
            // A fresh session restarts numbering; otherwise never move back
            if event_type == "READY" {
                self.sequence.store(seq, Ordering::Release);
            } else {
                self.sequence.fetch_max(seq, Ordering::AcqRel);
            }
        }

        let event = match Event::decode(&event_type, frame.d) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(%event_type, "unknown event type");
                return;
            }
            Err(err) => {
                error!(error = %err, "error decoding dispatch");
                return;
            }
        };

        match &event {
            Event::Ready(ready) => {
                info!(session_id = %ready.session_id, "session ready");
                self.session_id.write().clone_from(&ready.session_id);
                self.on_session_started(conn_id, ready.heartbeat_interval);
            }
            Event::Resumed(resumed) => {
                info!(seq = self.sequence(), "session resumed");
                self.on_session_started(conn_id, resumed.heartbeat_interval);
            }
            _ => {}
        }

        self.dispatcher.dispatch(event);
    }

    fn on_session_started(self: &Arc<Self>, conn_id: u64, interval_ms: Option<u64>) {
        self.data_ready.store(true, Ordering::Release);
        self.set_state(SessionState::Connected);

        let hello = self.hello_interval.load(Ordering::Acquire);
        let interval = interval_ms
            .filter(|ms| *ms > 0)
            .or((hello > 0).then_some(hello))
            .map_or(DEFAULT_HEARTBEAT_INTERVAL, Duration::from_millis);
        self.start_heartbeat(conn_id, interval);
    }

    // ------------------------------------------------------------------
    // Closing and reconnecting
    // ------------------------------------------------------------------

    async fn on_connection_lost(self: Arc<Self>, conn_id: u64, exit: ListenExit) {
        {
            let _lifecycle = self.lifecycle.lock().await;
            if self.current_conn.load(Ordering::Acquire) != conn_id {
                debug!(conn_id, "connection already closed elsewhere");
                return;
            }
            self.close_connection().await;
        }

        let reconnect = match exit {
            ListenExit::ReconnectRequested => true,
            ListenExit::ConnectionLost => self.config.should_reconnect,
            ListenExit::Fatal | ListenExit::Stopped => false,
        };
        if reconnect {
            self.reconnect().await;
        }
    }

    /// Reopen until it works, backing off between attempts
    ///
    /// Boxed because it is reached from the read loop, which reopening spawns.
    fn reconnect(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let mut backoff = Backoff::new(
                self.config.reconnect_initial_delay,
                self.config.reconnect_max_delay,
            );

            loop {
                self.set_state(SessionState::Reconnecting);
                info!("trying to reconnect to gateway");

                match self.open_connection().await {
                    Ok(()) => {
                        info!("successfully reconnected to gateway");
                        self.reconnect_sub_connections();
                        return;
                    }
                    Err(GatewayError::AlreadyOpen) => {
                        info!("websocket already exists, no need to reconnect");
                        return;
                    }
                    Err(GatewayError::ShutDown) => {
                        debug!("session closed, reconnect abandoned");
                        return;
                    }
                    Err(err) => error!(error = %err, "error reconnecting to gateway"),
                }

                let wait = backoff.next_delay();
                self.set_state(SessionState::Reconnecting);
                info!(wait_secs = wait.as_secs(), "waiting before next reconnect attempt");
                tokio::time::sleep(wait).await;
            }
        })
    }

    fn reconnect_sub_connections(&self) {
        let subs = self.sub_connections.read().clone();
        if subs.is_empty() {
            return;
        }

        let stagger = self.config.sub_connection_stagger;
        self.supervisor.spawn(async move {
            for sub in subs {
                info!(id = sub.id(), "reconnecting sub-connection");
                sub.reconnect().await;
                tokio::time::sleep(stagger).await;
            }
        });
    }

    /// Close the connection; the session id and sequence are kept for resuming
    pub async fn close(&self) {
        self.closing.store(true, Ordering::Release);
        let _lifecycle = self.lifecycle.lock().await;
        self.close_connection().await;
    }

    /// Tear down the live connection. Callers hold the lifecycle lock.
    async fn close_connection(&self) {
        self.data_ready.store(false, Ordering::Release);

        // Loops first, so neither sees the socket go away
        drop(self.listening.lock().take());
        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.abort();
        }
        self.current_conn.store(0, Ordering::Release);

        let writer = self.writer.lock().await.take();
        self.set_state(SessionState::Disconnected);
        let Some(mut writer) = writer else {
            return;
        };

        info!(conn_id = writer.conn_id, "closing gateway websocket");
        let frame = CloseFrame {
            code: WsCloseCode::Normal,
            reason: "".into(),
        };
        if let Err(err) = writer.sink.send(Message::Close(Some(frame))).await {
            debug!(error = %err, "error sending close frame");
        }
        tokio::time::sleep(self.config.close_grace).await;
        if let Err(err) = writer.sink.close().await {
            debug!(error = %err, "error closing websocket");
        }

        self.dispatcher.dispatch(Disconnect.into());
    }
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("sequence", &self.sequence())
            .finish_non_exhaustive()
    }
}

fn on_server_close(frame: Option<&CloseFrame<'_>>) -> ListenExit {
    let Some(frame) = frame else {
        warn!("gateway closed the connection");
        return ListenExit::ConnectionLost;
    };

    let raw = u16::from(frame.code);
    match CloseCode::from_u16(raw) {
        Some(code) if !code.should_reconnect() => {
            error!(%code, reason = %frame.reason, "gateway closed the session");
            ListenExit::Fatal
        }
        Some(code) => {
            warn!(%code, reason = %frame.reason, "gateway closed the connection");
            ListenExit::ConnectionLost
        }
        None => {
            warn!(code = raw, reason = %frame.reason, "gateway closed the connection");
            ListenExit::ConnectionLost
        }
    }
}

/// Inflate a zlib-compressed frame
fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cord_common::RestConfig;
    use cord_core::events::{MessageCreate, Ready};
    use cord_core::{EventKind, NullSink};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn new_session(config: GatewayConfig) -> (Arc<GatewaySession>, Arc<Dispatcher>) {
        let supervisor = Arc::new(TaskSupervisor::new());
        let rest = RestClient::new(
            RestConfig::new("Bot token").with_api_base("http://127.0.0.1:9"),
            Arc::clone(&supervisor),
            Arc::new(NullSink),
        )
        .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(None, Arc::clone(&supervisor)));
        let session = GatewaySession::new(config, Arc::new(rest), Arc::clone(&dispatcher), supervisor);
        (Arc::new(session), dispatcher)
    }

    fn frame(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_identify_payload_unsharded() {
        let (session, _) = new_session(GatewayConfig::new("Bot token"));
        let identify = session.identify_payload().unwrap();
        assert_eq!(identify.token, "Bot token");
        assert!(identify.compress);
        assert_eq!(identify.large_threshold, 250);
        assert!(identify.shard.is_none());
    }

    #[test]
    fn test_identify_payload_sharded() {
        let mut config = GatewayConfig::new("Bot token");
        config.shard_id = 1;
        config.shard_count = 4;
        let (session, _) = new_session(config.clone());
        assert_eq!(session.identify_payload().unwrap().shard, Some([1, 4]));

        config.shard_id = 4;
        let (session, _) = new_session(config);
        assert!(matches!(
            session.identify_payload().unwrap_err(),
            GatewayError::InvalidShard {
                shard_id: 4,
                shard_count: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_status_update_without_connection() {
        let (session, _) = new_session(GatewayConfig::new("Bot token"));
        let err = session.update_status(0, "chess").await.unwrap_err();
        assert!(matches!(err, GatewayError::NoConnection));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_quiet() {
        let (session, dispatcher) = new_session(GatewayConfig::new("Bot token"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.add_handler(move |_: Disconnect| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(());
            }
        });

        session.close().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_open_fails_when_gateway_unresolvable() {
        let (session, _) = new_session(GatewayConfig::new("Bot token"));
        let err = session.open().await.unwrap_err();
        assert!(matches!(err, GatewayError::Rest(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_ready_sets_session_and_sequence() {
        let (session, dispatcher) = new_session(GatewayConfig::new("Bot token"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.add_handler(move |ready: Ready| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ready.session_id);
            }
        });

        let ready = frame(serde_json::json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {"v": 6, "session_id": "abc", "heartbeat_interval": 41250,
                  "user": {"id": "1", "username": "bot"}}
        }));
        assert_eq!(session.on_frame(0, &ready).await, None);

        assert_eq!(session.session_id(), "abc");
        assert_eq!(session.sequence(), 1);
        assert!(session.is_ready());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(rx.recv().await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_sequence_only_moves_forward() {
        let (session, dispatcher) = new_session(GatewayConfig::new("Bot token"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.add_handler(move |create: MessageCreate| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(create.id.clone());
            }
        });

        let create = |seq: u64, id: &str| {
            frame(serde_json::json!({
                "op": 0, "s": seq, "t": "MESSAGE_CREATE",
                "d": {"id": id, "channel_id": "10", "content": "hi"}
            }))
        };
        session.on_frame(0, &create(5, "m5")).await;
        session.on_frame(0, &create(3, "m3")).await;

        assert_eq!(session.sequence(), 5);
        // late frames are still delivered
        let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        seen.sort();
        assert_eq!(seen, ["m3", "m5"]);
    }

    #[tokio::test]
    async fn test_unknown_dispatch_is_dropped() {
        let (session, dispatcher) = new_session(GatewayConfig::new("Bot token"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.add_any_handler(move |event: Arc<Event>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.kind());
            }
        });

        let unknown = frame(serde_json::json!({"op": 0, "s": 2, "t": "SOMETHING_NEW", "d": {}}));
        session.on_frame(0, &unknown).await;
        assert_eq!(session.sequence(), 2);
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err());
        assert_eq!(dispatcher.handler_count(EventKind::MessageCreate), 1);
    }

    #[tokio::test]
    async fn test_control_frames() {
        let (session, _) = new_session(GatewayConfig::new("Bot token"));

        let hello = frame(serde_json::json!({"op": 10, "d": {"heartbeat_interval": 45000}}));
        assert_eq!(session.on_frame(0, &hello).await, None);
        assert_eq!(session.hello_interval.load(Ordering::Acquire), 45_000);

        let ack = frame(serde_json::json!({"op": 11}));
        assert_eq!(session.on_frame(0, &ack).await, None);
        assert!(session.last_heartbeat_ack.read().is_some());

        // no connection to answer on; logged, not fatal
        let request = frame(serde_json::json!({"op": 1}));
        assert_eq!(session.on_frame(0, &request).await, None);

        let reconnect = frame(serde_json::json!({"op": 7}));
        assert_eq!(
            session.on_frame(0, &reconnect).await,
            Some(ListenExit::ReconnectRequested)
        );

        assert_eq!(session.on_frame(0, b"not json").await, None);
        assert_eq!(session.on_frame(0, br#"{"op": 42}"#).await, None);
    }

    struct RecordingSub {
        id: &'static str,
        calls: mpsc::UnboundedSender<(&'static str, Instant)>,
    }

    impl SubConnection for RecordingSub {
        fn id(&self) -> &str {
            self.id
        }

        fn reconnect(&self) -> BoxFuture<'_, ()> {
            let _ = self.calls.send((self.id, Instant::now()));
            Box::pin(async {})
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_connections_reconnect_staggered() {
        let mut config = GatewayConfig::new("Bot token");
        config.sub_connection_stagger = Duration::from_millis(100);
        let (session, _) = new_session(config);

        let (tx, mut rx) = mpsc::unbounded_channel();
        for id in ["voice-1", "voice-2"] {
            session.add_sub_connection(Arc::new(RecordingSub {
                id,
                calls: tx.clone(),
            }));
        }

        session.reconnect_sub_connections();
        let (first, at_first) = rx.recv().await.unwrap();
        let (second, at_second) = rx.recv().await.unwrap();

        assert_eq!((first, second), ("voice-1", "voice-2"));
        assert!(at_second - at_first >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_failed_heartbeat_clears_ready_and_stops() {
        let (session, _) = new_session(GatewayConfig::new("Bot token"));
        session.data_ready.store(true, Ordering::Release);
        let (stop, _) = watch::channel(());
        *session.listening.lock() = Some(stop);

        // no writer, so the first send fails
        session.start_heartbeat(1, Duration::from_millis(10));

        let stopped = tokio::time::timeout(Duration::from_secs(1), async {
            while !session
                .heartbeat
                .lock()
                .as_ref()
                .is_some_and(AbortHandle::is_finished)
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert!(stopped.is_ok());
        assert!(!session.is_ready());
        assert!(session.last_heartbeat_sent().is_none());
    }

    #[test]
    fn test_server_close_codes() {
        let close = |code: u16| CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };

        assert_eq!(on_server_close(None), ListenExit::ConnectionLost);
        assert_eq!(on_server_close(Some(&close(4000))), ListenExit::ConnectionLost);
        assert_eq!(on_server_close(Some(&close(4004))), ListenExit::Fatal);
        assert_eq!(on_server_close(Some(&close(1001))), ListenExit::ConnectionLost);
    }

    #[test]
    fn test_inflate() {
        let raw = br#"{"op":11}"#;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate(&compressed).unwrap(), raw);
        assert!(inflate(b"plain text").is_err());
    }
}
