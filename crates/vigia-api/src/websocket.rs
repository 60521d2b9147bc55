//! Push channel with auto-reconnect.
//!
//! [`ConnectionManager`] owns the single WebSocket connection to the alert
//! server. Inbound frames are validated into [`PushMessage`]s and streamed
//! through a [`tokio::sync::broadcast`] channel in arrival order, together
//! with `Connected` / `Disconnected` lifecycle signals. Reconnection uses
//! capped exponential backoff and gives up after a bounded number of
//! attempts, leaving the manager in [`ConnectionState::Failed`] until
//! [`connect`](ConnectionManager::connect) is called again.
//!
//! # Example
//!
//! ```rust,ignore
//! use vigia_api::{ConnectionManager, ReconnectConfig, TransportConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = url::Url::parse("wss://nvr.local/ws/alerts")?;
//! let manager = ConnectionManager::new(url, ReconnectConfig::default(), &TransportConfig::default(), CancellationToken::new());
//! let mut rx = manager.subscribe();
//! manager.connect().await;
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::protocol::{OutboundMessage, PushMessage, parse_push};
use crate::transport::TransportConfig;

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 16;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the push channel. Owned by [`ConnectionManager`];
/// everyone else only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    /// Reconnect attempts exhausted. Only an explicit `connect()` leaves this state.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ── ChannelEvent ─────────────────────────────────────────────────────

/// Everything the push channel reports to its subscribers, in order.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Handshake completed; the channel is open.
    Connected,
    /// A validated inbound message.
    Message(Arc<PushMessage>),
    /// A connection cycle ended (failed handshake or dropped session).
    Disconnected { reason: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for push-channel reconnection.
///
/// `delay = min(max_delay, floor(initial_delay * multiplier^attempt))`
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Growth factor per failed cycle. Default: 1.5.
    pub multiplier: f64,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever. Default: 10.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
            max_attempts: Some(10),
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

/// State shared between the manager and its background loop.
struct Shared {
    url: Url,
    reconnect: ReconnectConfig,
    authorization: Option<String>,
    state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<ChannelEvent>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn emit(&self, event: ChannelEvent) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.event_tx.send(event);
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Owner of the one push channel to the alert server.
///
/// At most one connection loop runs at a time. All inbound traffic is
/// surfaced through [`subscribe`](Self::subscribe); the socket itself is
/// never exposed.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    outbound: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    task: Mutex<Option<LoopHandle>>,
}

impl ConnectionManager {
    /// Create a manager for `url`. Does NOT connect -- call
    /// [`connect()`](Self::connect) to spawn the connection loop.
    ///
    /// Cancelling `cancel` tears down any running loop.
    pub fn new(
        url: Url,
        reconnect: ReconnectConfig,
        transport: &TransportConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                url,
                reconnect,
                authorization: transport.authorization_header(),
                state,
                event_tx,
            }),
            cancel,
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Spawn the connection loop if none is running.
    ///
    /// Returns immediately; the handshake happens asynchronously. This is
    /// also the only way out of [`ConnectionState::Failed`].
    pub async fn connect(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.join.is_finished()) {
            debug!("push channel loop already running");
            return;
        }
        if self.cancel.is_cancelled() {
            debug!("connection manager cancelled, not connecting");
            return;
        }

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        *self.outbound.lock().await = Some(out_tx);

        let loop_cancel = self.cancel.child_token();
        let shared = Arc::clone(&self.shared);
        let task_cancel = loop_cancel.clone();
        let join = tokio::spawn(async move {
            ws_loop(shared, out_rx, task_cancel).await;
        });

        *task = Some(LoopHandle {
            cancel: loop_cancel,
            join,
        });
    }

    /// Queue an outbound message on the open channel.
    pub async fn send(&self, message: OutboundMessage) -> Result<(), Error> {
        if self.state() != ConnectionState::Open {
            return Err(Error::ChannelClosed);
        }
        let tx = self.outbound.lock().await.clone().ok_or(Error::ChannelClosed)?;
        tx.send(message).await.map_err(|_| Error::ChannelClosed)
    }

    /// Stop the connection loop and close the socket. No reconnect is
    /// scheduled afterwards.
    pub async fn shutdown(&self) {
        let handle = self.task.lock().await.take();
        *self.outbound.lock().await = None;

        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.join.await {
                warn!(error = %e, "push channel task ended abnormally");
            }
        }
        self.shared.set_state(ConnectionState::Closed);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Get a new broadcast receiver for channel events.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.event_tx.subscribe()
    }

    /// The push endpoint.
    pub fn url(&self) -> &Url {
        &self.shared.url
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on drop, backoff → reconnect → give up.
async fn ws_loop(
    shared: Arc<Shared>,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    cancel: CancellationToken,
) {
    let reconnect = shared.reconnect.clone();
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&shared, &mut outbound, &cancel, &mut attempt) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        let reason = match result {
            Ok(()) => "connection closed".to_owned(),
            Err(e) => {
                warn!(error = %e, attempt, "push channel error");
                e.to_string()
            }
        };
        shared.set_state(ConnectionState::Closed);
        shared.emit(ChannelEvent::Disconnected { reason });

        if let Some(max) = reconnect.max_attempts {
            if attempt >= max {
                error!(
                    max_attempts = max,
                    "push channel reconnection limit reached, giving up"
                );
                shared.set_state(ConnectionState::Failed);
                return;
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }

    shared.set_state(ConnectionState::Closed);
    debug!("push channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket session and pump it until it drops.
///
/// Resets `attempt` once the handshake succeeds. Returns `Ok(())` when the
/// session ends with a close frame, end of stream, or cancellation.
async fn connect_and_read(
    shared: &Shared,
    outbound: &mut mpsc::Receiver<OutboundMessage>,
    cancel: &CancellationToken,
    attempt: &mut u32,
) -> Result<(), Error> {
    info!(url = %shared.url, "connecting push channel");

    let uri: tungstenite::http::Uri = shared
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(ref auth) = shared.authorization {
        request = request.with_header("Authorization", auth.clone());
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    *attempt = 0;
    // Requests queued for a previous session are stale.
    while outbound.try_recv().is_ok() {}

    shared.set_state(ConnectionState::Open);
    shared.emit(ChannelEvent::Connected);
    info!("push channel open");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            Some(message) = outbound.recv() => {
                debug!(?message, "sending push message");
                write
                    .send(tungstenite::Message::Text(message.to_json().into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_text(text.as_str(), &shared.event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(code = %cf.code, reason = %cf.reason, "push channel close frame received");
                        } else {
                            info!("push channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        info!("push channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Validate a text frame and broadcast it. Invalid frames are logged and
/// dropped; they never affect the connection.
fn dispatch_text(text: &str, event_tx: &broadcast::Sender<ChannelEvent>) {
    match parse_push(text) {
        Ok(message) => {
            trace!(kind = message.kind(), "push message received");
            let _ = event_tx.send(ChannelEvent::Message(Arc::new(message)));
        }
        Err(e) => {
            warn!(error = %e, "dropping invalid push message");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Capped exponential backoff, whole milliseconds.
///
/// `delay = min(max_delay, floor(initial * multiplier^attempt))`
///
/// Deterministic (no jitter) so operators see a predictable retry cadence.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let initial_ms = config.initial_delay.as_secs_f64() * 1000.0;
    let max_ms = config.max_delay.as_secs_f64() * 1000.0;

    let raw = (initial_ms * config.multiplier.powi(exponent)).floor();
    let capped = if raw.is_finite() { raw.min(max_ms) } else { max_ms };

    Duration::from_secs_f64(capped.max(0.0) / 1000.0)
}

// ── Tests ────────────────────────────────────────────────────────────
