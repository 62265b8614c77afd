//! Notification stream supervisor with heartbeat watchdog.
//!
//! Keeps one WebSocket session to the hub's
//! `/api/v1/developer/devices/notifications` endpoint alive for the lifetime
//! of the process. Decoded non-heartbeat frames are forwarded to an
//! unbounded sink; the supervisor never waits on its consumer.
//!
//! # Session lifecycle
//!
//! ```text
//! Disconnected → Connecting → Connected → (Closing | Failed) → Connecting → …
//! ```
//!
//! The hub sends `{"data":"Hello"}` roughly every few seconds. Every frame
//! that parses as JSON resets the heartbeat clock. A watchdog armed per
//! session tears the connection down once the clock is older than
//! `heartbeat_timeout`, and the single reconnect path dials again after
//! `redial_delay`. Reconnection is unbounded.
//!
//! # Example
//!
//! ```rust,ignore
//! use unilock_api::websocket::{NotificationDialer, StreamConfig, StreamSupervisor};
//!
//! let dialer = NotificationDialer::new(url, token, &TlsMode::DangerAcceptInvalid, config.connect_timeout)?;
//! let supervisor = StreamSupervisor::new(dialer, StreamConfig::default());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! supervisor.start(tx);
//!
//! while let Some(frame) = rx.recv().await {
//!     println!("{frame}");
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::tls;
use crate::transport::TlsMode;

/// Payload value the hub uses for keep-alive frames.
const HEARTBEAT_DATA: &str = "Hello";

// ── StreamConfig ─────────────────────────────────────────────────────

/// Timing knobs for the supervisor.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum silence tolerated before a session is considered stale. Default: 60s.
    pub heartbeat_timeout: Duration,
    /// How often the watchdog checks the heartbeat clock. Default: 60s.
    pub watchdog_interval: Duration,
    /// Pause between a session ending and the next dial. Default: 1s.
    pub redial_delay: Duration,
    /// Upper bound on a single WebSocket handshake. Default: 30s.
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(60),
            redial_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Observable state of the notification stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The hub closed the session or the watchdog tore it down.
    Closing,
    /// The session ended on a transport error or the dial failed.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Failed => "failed",
        })
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Result of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Heartbeat,
    Payload(Value),
}

/// Parse a text frame. `{"data":"Hello"}` is a heartbeat.
pub fn decode_frame(text: &str) -> Result<Decoded, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("data").and_then(Value::as_str) == Some(HEARTBEAT_DATA) {
        return Ok(Decoded::Heartbeat);
    }
    Ok(Decoded::Payload(value))
}

// ── Dialer ───────────────────────────────────────────────────────────

/// Incoming half of a WebSocket session.
pub type MessageStream =
    Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;

/// Opens one WebSocket session. The supervisor calls this once per attempt.
pub trait Dialer: Send + Sync + 'static {
    fn dial(&self) -> impl Future<Output = Result<MessageStream, Error>> + Send;
}

/// Dials the hub's notification endpoint with bearer auth.
pub struct NotificationDialer {
    url: Url,
    token: SecretString,
    connector: Option<Connector>,
    connect_timeout: Duration,
}

impl NotificationDialer {
    pub fn new(
        url: Url,
        token: SecretString,
        tls_mode: &TlsMode,
        connect_timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            url,
            token,
            connector: tls::ws_connector(tls_mode)?,
            connect_timeout,
        })
    }
}

impl fmt::Debug for NotificationDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDialer")
            .field("url", &self.url.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl Dialer for NotificationDialer {
    async fn dial(&self) -> Result<MessageStream, Error> {
        info!(url = %self.url, "connecting to notification stream");

        let uri: tungstenite::http::Uri = self.url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;
        let request = ClientRequestBuilder::new(uri).with_header(
            "Authorization",
            format!("Bearer {}", self.token.expose_secret()),
        );

        let handshake = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            self.connector.clone(),
        );

        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                Error::WebSocketConnect(format!(
                    "handshake timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        Ok(Box::pin(ws_stream))
    }
}

// ── StreamSupervisor ─────────────────────────────────────────────────

/// Owns the reconnect loop for one notification stream.
///
/// Cheaply cloneable; clones share the same loop.
pub struct StreamSupervisor<D> {
    inner: Arc<SupervisorInner<D>>,
}

impl<D> Clone for StreamSupervisor<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SupervisorInner<D> {
    dialer: D,
    config: StreamConfig,
    state_tx: watch::Sender<ConnectionState>,
    last_heartbeat: Mutex<Option<DateTime<Utc>>>,
    reconnects: AtomicU64,
    started: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<D> SupervisorInner<D> {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn mark_heartbeat(&self) {
        if let Ok(mut guard) = self.last_heartbeat.lock() {
            *guard = Some(Utc::now());
        }
    }
}

impl<D: Dialer> StreamSupervisor<D> {
    pub fn new(dialer: D, config: StreamConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SupervisorInner {
                dialer,
                config,
                state_tx,
                last_heartbeat: Mutex::new(None),
                reconnects: AtomicU64::new(0),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the supervision loop, forwarding payload frames into `sink`.
    ///
    /// Returns `false` without doing anything if the loop was already started.
    pub fn start(&self, sink: mpsc::UnboundedSender<Value>) -> bool {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("notification stream already started");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(supervise(inner, sink));
        if let Ok(mut task) = self.inner.task.lock() {
            *task = Some(handle);
        }
        true
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Wall-clock time of the last frame that reset the heartbeat clock.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.inner
            .last_heartbeat
            .lock()
            .ok()
            .and_then(|guard| *guard)
    }

    /// Number of redials since start.
    pub fn reconnects(&self) -> u64 {
        self.inner.reconnects.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }
}

// ── Supervision loop ─────────────────────────────────────────────────

enum SessionEnd {
    Cancelled,
    Closed,
    Stale(Duration),
    Failed(Error),
    SinkClosed,
}

async fn supervise<D: Dialer>(inner: Arc<SupervisorInner<D>>, sink: mpsc::UnboundedSender<Value>) {
    let mut attempt: u64 = 0;

    loop {
        inner.set_state(ConnectionState::Connecting);

        let dialed = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            result = inner.dialer.dial() => result,
        };

        match dialed {
            Ok(stream) => {
                info!(attempt, "notification stream connected");
                inner.set_state(ConnectionState::Connected);

                match run_session(&inner, stream, &sink).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::SinkClosed => {
                        info!("frame consumer dropped, stopping notification stream");
                        break;
                    }
                    SessionEnd::Closed => {
                        info!("notification stream closed, redialing");
                        inner.set_state(ConnectionState::Closing);
                    }
                    SessionEnd::Stale(silence) => {
                        warn!(
                            silence_secs = silence.as_secs(),
                            "no heartbeat from hub, redialing"
                        );
                        inner.set_state(ConnectionState::Closing);
                    }
                    SessionEnd::Failed(e) => {
                        warn!(error = %e, "notification stream failed, redialing");
                        inner.set_state(ConnectionState::Failed);
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, attempt, "notification stream dial failed");
                inner.set_state(ConnectionState::Failed);
            }
        }

        attempt += 1;
        inner.reconnects.fetch_add(1, Ordering::Relaxed);

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            () = tokio::time::sleep(inner.config.redial_delay) => {}
        }
    }

    inner.set_state(ConnectionState::Disconnected);
    debug!("notification stream loop exiting");
}

/// Read one session until it ends. The stream is dropped on return.
async fn run_session<D>(
    inner: &SupervisorInner<D>,
    mut stream: MessageStream,
    sink: &mpsc::UnboundedSender<Value>,
) -> SessionEnd {
    let period = inner.config.watchdog_interval;
    let mut last_beat = Instant::now();
    inner.mark_heartbeat();

    let mut watchdog = tokio::time::interval_at(last_beat + period, period);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return SessionEnd::Cancelled,
            _ = watchdog.tick() => {
                let silence = last_beat.elapsed();
                if silence >= inner.config.heartbeat_timeout {
                    return SessionEnd::Stale(silence);
                }
                trace!(silence_ms = silence.as_millis(), "watchdog ok");
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(Decoded::Heartbeat) => {
                        last_beat = Instant::now();
                        inner.mark_heartbeat();
                        trace!("heartbeat");
                    }
                    Ok(Decoded::Payload(value)) => {
                        last_beat = Instant::now();
                        inner.mark_heartbeat();
                        if sink.send(value).is_err() {
                            return SessionEnd::SinkClosed;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "discarding unparseable notification frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    if let Some(cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "close frame received");
                    }
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => {
                    // Ping, Pong, Binary: tungstenite answers pings itself
                }
                Some(Err(e)) => return SessionEnd::Failed(Error::WebSocketConnect(e.to_string())),
                None => return SessionEnd::Closed,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
