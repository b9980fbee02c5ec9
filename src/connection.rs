//! STOMP-over-WebSocket connection manager.
//!
//! One [`RealtimeConnection`] owns one socket. A background task holds
//! the WebSocket stream and the subscription map; the public handle
//! talks to it over a command channel, so all socket I/O and map
//! mutation are serialized and callers always observe consistent
//! snapshots.
//!
//! Lifecycle is fully explicit:
//!
//! - `connect(params)` establishes the socket and the STOMP session;
//!   calling while already connecting/connected is a no-op.
//! - `disconnect()` tears the socket down unconditionally and clears all
//!   subscription bookkeeping.
//! - **There is no automatic reconnect.** When the connection drops, the
//!   status moves to `Disconnected`/`Error` and stays there until the
//!   caller decides to call [`reconnect`](RealtimeConnection::reconnect).
//!   Subscriptions do not survive a drop; callers re-subscribe after a
//!   successful reconnect.

use crate::error::{AtelierLinkError, Result};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::models::{ConnectParams, ConnectionStatus, SubscriptionInfo};
use crate::stomp::{self, Command, Frame};
use crate::timeouts::AtelierLinkTimeouts;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::connect_async;

type WebSocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

/// Handler invoked with the raw body of every MESSAGE frame delivered on
/// a subscription. Invoked by the connection task in transport order.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Generated subscription identifier (`sub-N`).
pub type SubscriptionId = String;

/// Maximum sleep duration that won't overflow `Instant + Duration`.
/// ~100 years is far enough into the future to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Incoming-heartbeat grace factor: the socket is declared dead after
/// this many negotiated intervals of silence.
const HEARTBEAT_GRACE: u32 = 2;

/// Current time in millis since Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Build a `Vec<SubscriptionInfo>` snapshot from the internal subs map.
fn snapshot_subscriptions(subs: &HashMap<String, SubEntry>) -> Vec<SubscriptionInfo> {
    subs.values()
        .map(|entry| SubscriptionInfo {
            id: entry.id.clone(),
            destination: entry.destination.clone(),
            created_at_ms: entry.created_at_ms,
        })
        .collect()
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public API to the background connection task.
enum ConnCmd {
    /// Establish the connection (no-op when already connecting/connected).
    Connect {
        params: ConnectParams,
        result_tx: oneshot::Sender<ConnectionStatus>,
    },
    /// Re-establish using the params of the last `Connect`.
    Reconnect,
    /// Unconditional teardown.
    Disconnect,
    /// Fire-and-forget SEND frame; dropped when not connected.
    Publish { destination: String, body: String },
    /// Register a topic subscription.
    Subscribe {
        destination: String,
        handler: MessageHandler,
        result_tx: oneshot::Sender<Option<SubscriptionId>>,
    },
    /// Release a subscription by id.
    Unsubscribe { id: SubscriptionId },
    /// Snapshot the active subscriptions.
    ListSubscriptions {
        result_tx: oneshot::Sender<Vec<SubscriptionInfo>>,
    },
    /// Terminate the background task.
    Shutdown,
}

// ── Per-subscription state ──────────────────────────────────────────────────

/// Internal state for one active subscription.
struct SubEntry {
    id: SubscriptionId,
    destination: String,
    handler: MessageHandler,
    /// Millis since Unix epoch when this subscription was created.
    created_at_ms: u64,
}

// ── RealtimeConnection (public handle) ──────────────────────────────────────

/// The realtime connection manager.
///
/// Create with [`RealtimeConnection::new`] (requires a tokio runtime;
/// the background task is spawned immediately, socketless, and waits for
/// `connect`). Dropping the handle shuts the task down best-effort.
pub struct RealtimeConnection {
    /// Channel to the background connection task.
    cmd_tx: mpsc::Sender<ConnCmd>,
    /// Status observation; the task is the only writer.
    status_rx: watch::Receiver<ConnectionStatus>,
    /// Last transport/protocol error message, cleared on successful connect.
    last_error: Arc<RwLock<Option<String>>>,
    /// Background task handle.
    _task: JoinHandle<()>,
}

impl RealtimeConnection {
    /// Create the manager and spawn its background task.
    ///
    /// No socket is opened until [`connect`](Self::connect) is called.
    pub fn new(timeouts: AtelierLinkTimeouts, handlers: EventHandlers) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<ConnCmd>(256);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let last_error = Arc::new(RwLock::new(None));

        let error_slot = last_error.clone();
        let task = tokio::spawn(async move {
            connection_task(cmd_rx, status_tx, timeouts, handlers, error_slot).await;
        });

        Self {
            cmd_tx,
            status_rx,
            last_error,
            _task: task,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch receiver for status changes, for callers that re-render on
    /// transitions.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Whether the STOMP session is currently established.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Last transport/protocol error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|guard| guard.clone())
    }

    /// Establish the connection.
    ///
    /// The token is injected into the CONNECT frame as
    /// `Authorization: Bearer <token>`; connection-level auth, not
    /// per-subscription. Returns the status as observed right after the
    /// call is processed (`Connecting` when an attempt started, the
    /// current status on the idempotent no-op path). Establishment
    /// itself is observed through `on_connect` and the status watch, not
    /// through the returned value.
    pub async fn connect(&self, params: ConnectParams) -> ConnectionStatus {
        let (result_tx, result_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(ConnCmd::Connect { params, result_tx })
            .await
            .is_err()
        {
            return ConnectionStatus::Error;
        }
        result_rx.await.unwrap_or(ConnectionStatus::Error)
    }

    /// Tear the connection down unconditionally.
    ///
    /// No graceful unsubscribe pass; all subscription bookkeeping is
    /// dropped and the status resets to `Disconnected`.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ConnCmd::Disconnect).await;
    }

    /// Explicitly re-establish the connection after a drop.
    ///
    /// Uses the parameters of the last `connect`. No-op (with a warning)
    /// when never connected or while connecting/connected; this library
    /// never reconnects on its own.
    pub async fn reconnect(&self) {
        let _ = self.cmd_tx.send(ConnCmd::Reconnect).await;
    }

    /// Fire-and-forget publish to a destination.
    ///
    /// No acknowledgement tracking and no retry; the frame is dropped
    /// with a warning unless the connection is currently `Connected`.
    pub async fn publish(&self, destination: &str, body: impl Into<String>) {
        if destination.trim().is_empty() {
            log::warn!("publish with empty destination dropped");
            return;
        }
        let _ = self
            .cmd_tx
            .send(ConnCmd::Publish {
                destination: destination.to_string(),
                body: body.into(),
            })
            .await;
    }

    /// Subscribe to a topic destination.
    ///
    /// Returns `None` when the destination is empty or the connection is
    /// not established; validated eagerly, nothing is partially
    /// registered.
    ///
    /// **Duplicate destinations are first-wins**: subscribing again to an
    /// already-subscribed destination returns the existing id and keeps
    /// the original handler. The replacement handler is silently ignored,
    /// so callers must `unsubscribe` first if they need to swap handlers.
    pub async fn subscribe(
        &self,
        destination: &str,
        handler: impl Fn(&str) + Send + Sync + 'static,
    ) -> Option<SubscriptionId> {
        if destination.trim().is_empty() {
            log::warn!("subscribe with empty destination rejected");
            return None;
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(ConnCmd::Subscribe {
                destination: destination.to_string(),
                handler: Arc::new(handler),
                result_tx,
            })
            .await
            .ok()?;
        result_rx.await.ok().flatten()
    }

    /// Release a subscription.
    ///
    /// An unknown id is a logged no-op, never an error.
    pub async fn unsubscribe(&self, id: &str) {
        let _ = self
            .cmd_tx
            .send(ConnCmd::Unsubscribe { id: id.to_string() })
            .await;
    }

    /// Snapshot of the active subscriptions.
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let (result_tx, result_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(ConnCmd::ListSubscriptions { result_tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        result_rx.await.unwrap_or_default()
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        // Best-effort shutdown signal.
        let _ = self.cmd_tx.try_send(ConnCmd::Shutdown);
    }
}

// ── Background connection task ──────────────────────────────────────────────

fn set_status(status_tx: &watch::Sender<ConnectionStatus>, status: ConnectionStatus) {
    log::debug!("Connection status -> {}", status);
    let _ = status_tx.send(status);
}

fn record_error(slot: &RwLock<Option<String>>, message: &str) {
    if let Ok(mut guard) = slot.write() {
        *guard = Some(message.to_string());
    }
}

fn clear_error(slot: &RwLock<Option<String>>) {
    if let Ok(mut guard) = slot.write() {
        *guard = None;
    }
}

/// Serialize and send one frame, firing the `on_send` debug hook.
async fn send_frame(
    stream: &mut WebSocketStream,
    handlers: &EventHandlers,
    frame: &Frame,
) -> std::result::Result<(), WsError> {
    let text = frame.serialize();
    handlers.emit_send(&text);
    stream.send(Message::Text(text.into())).await
}

/// Route a MESSAGE frame to its subscription handler.
///
/// Matches on the `subscription` header first (the id the server echoes
/// back), then falls back to the destination. An unmatched frame is
/// logged and dropped.
fn deliver_message(frame: &Frame, subs: &HashMap<String, SubEntry>) {
    let entry = frame
        .header_value("subscription")
        .and_then(|sid| subs.values().find(|e| e.id == sid))
        .or_else(|| {
            frame
                .header_value("destination")
                .and_then(|dest| subs.get(dest))
        });

    match entry {
        Some(entry) => (entry.handler)(&frame.body),
        None => log::debug!(
            "No subscription for incoming message (destination: {:?})",
            frame.header_value("destination")
        ),
    }
}

/// Open the WebSocket and complete the STOMP handshake.
///
/// Returns the stream plus the negotiated heartbeat intervals
/// `(outgoing, incoming)`. Failures are emitted through `on_error`
/// before being returned.
async fn establish(
    params: &ConnectParams,
    timeouts: &AtelierLinkTimeouts,
    handlers: &EventHandlers,
) -> Result<(WebSocketStream, Duration, Duration)> {
    log::debug!("Establishing WebSocket connection to {}", params.url);

    let request = params.url.as_str().into_client_request().map_err(|e| {
        AtelierLinkError::ConfigurationError(format!(
            "Invalid WebSocket URL '{}': {}",
            params.url, e
        ))
    })?;
    let host = request
        .uri()
        .host()
        .unwrap_or("localhost")
        .to_string();

    let connect_result =
        tokio::time::timeout(timeouts.connection_timeout, connect_async(request)).await;

    let mut stream = match connect_result {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(WsError::Http(response))) => {
            let message = match response.status().as_u16() {
                401 => "Unauthorized: WebSocket upgrade requires a valid token".to_string(),
                403 => "Forbidden: WebSocket upgrade denied".to_string(),
                code => format!("WebSocket upgrade failed with HTTP {}", code),
            };
            handlers.emit_error(ConnectionError::websocket(message.clone()));
            return Err(AtelierLinkError::WebSocketError(message));
        },
        Ok(Err(e)) => {
            let message = format!("Connection failed: {}", e);
            handlers.emit_error(ConnectionError::websocket(message.clone()));
            return Err(AtelierLinkError::WebSocketError(message));
        },
        Err(_) => {
            let message = format!("Connection timeout ({:?})", timeouts.connection_timeout);
            handlers.emit_error(ConnectionError::websocket(message.clone()));
            return Err(AtelierLinkError::TimeoutError(message));
        },
    };

    // STOMP handshake: CONNECT with bearer token, wait for CONNECTED.
    let offered_out = timeouts.heartbeat_outgoing.as_millis() as u64;
    let offered_in = timeouts.heartbeat_incoming.as_millis() as u64;
    let connect_frame = Frame::new(Command::Connect)
        .header("accept-version", stomp::STOMP_VERSION)
        .header("host", host)
        .header("heart-beat", format!("{},{}", offered_out, offered_in))
        .header("Authorization", format!("Bearer {}", params.token));

    if let Err(e) = send_frame(&mut stream, handlers, &connect_frame).await {
        let message = format!("Failed to send CONNECT frame: {}", e);
        handlers.emit_error(ConnectionError::websocket(message.clone()));
        return Err(AtelierLinkError::WebSocketError(message));
    }

    let connected = await_connected(&mut stream, handlers, timeouts.handshake_timeout).await?;
    let (hb_out, hb_in) = stomp::negotiate_heart_beat(
        offered_out,
        offered_in,
        connected.header_value("heart-beat"),
    );
    log::info!(
        "STOMP session established (heartbeat out={:?}, in={:?})",
        hb_out,
        hb_in
    );

    Ok((stream, hb_out, hb_in))
}

/// Wait for the server's CONNECTED frame, tolerating heartbeats and
/// control frames during the handshake.
async fn await_connected(
    stream: &mut WebSocketStream,
    handlers: &EventHandlers,
    handshake_timeout: Duration,
) -> Result<Frame> {
    let deadline = TokioInstant::now() + handshake_timeout;
    loop {
        let remaining = deadline.saturating_duration_since(TokioInstant::now());
        if remaining.is_zero() {
            let message = format!("STOMP handshake timeout ({:?})", handshake_timeout);
            handlers.emit_error(ConnectionError::stomp(message.clone()));
            return Err(AtelierLinkError::TimeoutError(message));
        }

        match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                handlers.emit_receive(text.as_str());
                match Frame::parse(text.as_str()) {
                    Ok(Some(frame)) if frame.command == Command::Connected => {
                        return Ok(frame);
                    },
                    Ok(Some(frame)) if frame.command == Command::Error => {
                        let message = frame
                            .header_value("message")
                            .unwrap_or("server rejected CONNECT")
                            .to_string();
                        let mut error =
                            ConnectionError::stomp(format!("STOMP handshake rejected: {}", message));
                        if !frame.body.is_empty() {
                            error = error.with_detail(frame.body.clone());
                        }
                        handlers.emit_error(error);
                        return Err(AtelierLinkError::AuthenticationError(message));
                    },
                    // Tolerate heartbeats and unexpected frames during
                    // the handshake; keep waiting for CONNECTED.
                    Ok(_) => continue,
                    Err(e) => {
                        handlers.emit_error(ConnectionError::stomp(e.to_string()));
                        return Err(e);
                    },
                }
            },
            Ok(Some(Ok(Message::Ping(payload)))) => {
                let _ = stream.send(Message::Pong(payload)).await;
            },
            Ok(Some(Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_)))) => continue,
            Ok(Some(Ok(Message::Close(_)))) => {
                let message = "Connection closed during STOMP handshake".to_string();
                handlers.emit_error(ConnectionError::websocket(message.clone()));
                return Err(AtelierLinkError::WebSocketError(message));
            },
            Ok(Some(Err(e))) => {
                let message = format!("WebSocket error during handshake: {}", e);
                handlers.emit_error(ConnectionError::websocket(message.clone()));
                return Err(AtelierLinkError::WebSocketError(message));
            },
            Ok(None) => {
                let message = "Connection ended before handshake completed".to_string();
                handlers.emit_error(ConnectionError::websocket(message.clone()));
                return Err(AtelierLinkError::WebSocketError(message));
            },
            Err(_) => {
                let message = format!("STOMP handshake timeout ({:?})", handshake_timeout);
                handlers.emit_error(ConnectionError::stomp(message.clone()));
                return Err(AtelierLinkError::TimeoutError(message));
            },
        }
    }
}

/// The background task owning the socket and the subscription map.
///
/// Lifecycle:
/// 1. Wait for a `Connect` command, establish socket + STOMP session
/// 2. Event loop: WS frames + commands + outgoing/incoming heartbeats
/// 3. On drop or error: clear subscriptions, park, wait for the caller
///    to issue `Reconnect` (never reconnects on its own)
async fn connection_task(
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
    status_tx: watch::Sender<ConnectionStatus>,
    timeouts: AtelierLinkTimeouts,
    handlers: EventHandlers,
    last_error: Arc<RwLock<Option<String>>>,
) {
    let mut ws: Option<WebSocketStream> = None;
    let mut subs: HashMap<String, SubEntry> = HashMap::new();
    let mut last_params: Option<ConnectParams> = None;
    let mut next_sub_seq: u64 = 1;

    // Negotiated heartbeat intervals; zero disables the direction.
    let mut hb_out = Duration::ZERO;
    let mut hb_in = Duration::ZERO;
    let mut recv_window = FAR_FUTURE;
    let mut send_deadline = TokioInstant::now() + FAR_FUTURE;
    let mut recv_deadline = TokioInstant::now() + FAR_FUTURE;

    loop {
        if let Some(ref mut stream) = ws {
            let out_sleep = tokio::time::sleep_until(send_deadline);
            tokio::pin!(out_sleep);
            let in_sleep = tokio::time::sleep_until(recv_deadline);
            tokio::pin!(in_sleep);

            tokio::select! {
                biased;

                // Incoming-heartbeat window elapsed with no server activity.
                _ = &mut in_sleep, if !hb_in.is_zero() => {
                    let message = format!(
                        "Heartbeat timeout: no server activity within {:?}",
                        recv_window,
                    );
                    log::warn!("{}", message);
                    record_error(&last_error, &message);
                    handlers.emit_error(ConnectionError::websocket(message.clone()));
                    let _ = stream.close(None).await;
                    handlers.emit_disconnect(DisconnectReason::new(message));
                    subs.clear();
                    set_status(&status_tx, ConnectionStatus::Error);
                    ws = None;
                    continue;
                }

                // Commands from the public API.
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ConnCmd::Connect { result_tx, .. }) => {
                            log::debug!("connect() while already connected; no-op");
                            let _ = result_tx.send(ConnectionStatus::Connected);
                        },
                        Some(ConnCmd::Reconnect) => {
                            log::warn!("reconnect() while connected; ignoring");
                        },
                        Some(ConnCmd::Disconnect) => {
                            let _ = send_frame(stream, &handlers, &Frame::new(Command::Disconnect)).await;
                            let _ = stream.close(None).await;
                            subs.clear();
                            set_status(&status_tx, ConnectionStatus::Disconnected);
                            handlers.emit_disconnect(DisconnectReason::new("Client disconnected"));
                            ws = None;
                            continue;
                        },
                        Some(ConnCmd::Publish { destination, body }) => {
                            let mut frame = Frame::new(Command::Send)
                                .header("destination", destination.clone());
                            if !body.is_empty() {
                                frame = frame
                                    .header("content-type", "application/json")
                                    .body(body);
                            }
                            match send_frame(stream, &handlers, &frame).await {
                                Ok(()) => {
                                    if !hb_out.is_zero() {
                                        send_deadline = TokioInstant::now() + hb_out;
                                    }
                                },
                                Err(e) => {
                                    let message = format!("Failed to send to '{}': {}", destination, e);
                                    log::warn!("{}", message);
                                    record_error(&last_error, &message);
                                    handlers.emit_error(ConnectionError::websocket(message.clone()));
                                    handlers.emit_disconnect(DisconnectReason::new(message));
                                    subs.clear();
                                    set_status(&status_tx, ConnectionStatus::Error);
                                    ws = None;
                                    continue;
                                },
                            }
                        },
                        Some(ConnCmd::Subscribe { destination, handler, result_tx }) => {
                            if let Some(existing) = subs.get(&destination) {
                                // First handler wins; the new one is dropped.
                                log::debug!(
                                    "subscribe('{}') already active as {}; returning existing id",
                                    destination,
                                    existing.id,
                                );
                                let _ = result_tx.send(Some(existing.id.clone()));
                            } else {
                                let id = format!("sub-{}", next_sub_seq);
                                let frame = Frame::new(Command::Subscribe)
                                    .header("id", id.clone())
                                    .header("destination", destination.clone())
                                    .header("ack", "auto");
                                match send_frame(stream, &handlers, &frame).await {
                                    Ok(()) => {
                                        next_sub_seq += 1;
                                        if !hb_out.is_zero() {
                                            send_deadline = TokioInstant::now() + hb_out;
                                        }
                                        subs.insert(destination.clone(), SubEntry {
                                            id: id.clone(),
                                            destination,
                                            handler,
                                            created_at_ms: now_ms(),
                                        });
                                        let _ = result_tx.send(Some(id));
                                    },
                                    Err(e) => {
                                        let message = format!(
                                            "Failed to send SUBSCRIBE for '{}': {}",
                                            destination, e,
                                        );
                                        log::warn!("{}", message);
                                        handlers.emit_error(ConnectionError::websocket(message));
                                        let _ = result_tx.send(None);
                                    },
                                }
                            }
                        },
                        Some(ConnCmd::Unsubscribe { id }) => {
                            let destination = subs
                                .values()
                                .find(|e| e.id == id)
                                .map(|e| e.destination.clone());
                            match destination {
                                Some(destination) => {
                                    subs.remove(&destination);
                                    let frame = Frame::new(Command::Unsubscribe)
                                        .header("id", id.clone());
                                    if let Err(e) = send_frame(stream, &handlers, &frame).await {
                                        log::warn!("Failed to send UNSUBSCRIBE for {}: {}", id, e);
                                    } else if !hb_out.is_zero() {
                                        send_deadline = TokioInstant::now() + hb_out;
                                    }
                                },
                                None => {
                                    log::warn!("unsubscribe for unknown id '{}'; ignoring", id);
                                },
                            }
                        },
                        Some(ConnCmd::ListSubscriptions { result_tx }) => {
                            let _ = result_tx.send(snapshot_subscriptions(&subs));
                        },
                        Some(ConnCmd::Shutdown) | None => {
                            let _ = stream.close(None).await;
                            set_status(&status_tx, ConnectionStatus::Disconnected);
                            handlers.emit_disconnect(DisconnectReason::new("Client disposed"));
                            return;
                        },
                    }
                }

                // Outgoing heartbeat: the connection has been send-idle
                // for the negotiated interval.
                _ = &mut out_sleep, if !hb_out.is_zero() => {
                    if let Err(e) = stream.send(Message::Text("\n".into())).await {
                        let message = format!("Failed to send heartbeat: {}", e);
                        log::warn!("{}", message);
                        record_error(&last_error, &message);
                        handlers.emit_error(ConnectionError::websocket(message.clone()));
                        handlers.emit_disconnect(DisconnectReason::new(message));
                        subs.clear();
                        set_status(&status_tx, ConnectionStatus::Error);
                        ws = None;
                        continue;
                    }
                    handlers.emit_send("\n");
                    send_deadline = TokioInstant::now() + hb_out;
                }

                // WebSocket frames.
                frame = stream.next() => {
                    // Any inbound activity counts toward liveness.
                    if !hb_in.is_zero() {
                        recv_deadline = TokioInstant::now() + recv_window;
                    }

                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            handlers.emit_receive(text.as_str());
                            match Frame::parse(text.as_str()) {
                                Ok(None) => {}, // heartbeat
                                Ok(Some(frame)) => match frame.command {
                                    Command::Message => {
                                        deliver_message(&frame, &subs);
                                    },
                                    Command::Error => {
                                        // STOMP servers close after ERROR;
                                        // treat it as connection-terminal.
                                        let message = frame
                                            .header_value("message")
                                            .unwrap_or("server sent ERROR frame")
                                            .to_string();
                                        record_error(&last_error, &message);
                                        let mut error = ConnectionError::stomp(
                                            format!("STOMP error frame: {}", message),
                                        );
                                        if !frame.body.is_empty() {
                                            error = error.with_detail(frame.body.clone());
                                        }
                                        handlers.emit_error(error);
                                        let _ = stream.close(None).await;
                                        handlers.emit_disconnect(
                                            DisconnectReason::new(format!("STOMP error: {}", message)),
                                        );
                                        subs.clear();
                                        set_status(&status_tx, ConnectionStatus::Error);
                                        ws = None;
                                        continue;
                                    },
                                    Command::Receipt => {
                                        log::debug!(
                                            "Receipt frame: {:?}",
                                            frame.header_value("receipt-id"),
                                        );
                                    },
                                    other => {
                                        log::debug!("Ignoring unexpected {} frame", other);
                                    },
                                },
                                Err(e) => {
                                    // A single unparseable frame is isolated:
                                    // reported, not connection-fatal.
                                    log::warn!("Discarding malformed STOMP frame: {}", e);
                                    handlers.emit_error(
                                        ConnectionError::stomp(e.to_string())
                                            .with_detail(text.to_string()),
                                    );
                                },
                            }
                        },
                        Some(Ok(Message::Binary(data))) => {
                            // The Atelier wire contract is text frames only.
                            log::debug!("Ignoring {}-byte binary frame", data.len());
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = stream.send(Message::Pong(payload)).await;
                        },
                        Some(Ok(Message::Pong(_))) => {},
                        Some(Ok(Message::Frame(_))) => {},
                        Some(Ok(Message::Close(close_frame))) => {
                            let reason = if let Some(f) = close_frame {
                                DisconnectReason::with_code(f.reason.to_string(), f.code.into())
                            } else {
                                DisconnectReason::new("Server closed connection")
                            };
                            handlers.emit_disconnect(reason);
                            subs.clear();
                            set_status(&status_tx, ConnectionStatus::Disconnected);
                            ws = None;
                            continue;
                        },
                        Some(Err(e)) => {
                            let message = format!("WebSocket error: {}", e);
                            record_error(&last_error, &message);
                            handlers.emit_error(ConnectionError::websocket(message.clone()));
                            handlers.emit_disconnect(DisconnectReason::new(message));
                            subs.clear();
                            set_status(&status_tx, ConnectionStatus::Error);
                            ws = None;
                            continue;
                        },
                        None => {
                            handlers.emit_disconnect(
                                DisconnectReason::new("WebSocket stream ended"),
                            );
                            subs.clear();
                            set_status(&status_tx, ConnectionStatus::Disconnected);
                            ws = None;
                            continue;
                        },
                    }
                }
            }
        } else {
            // ── No socket: process commands until told to connect ──
            match cmd_rx.recv().await {
                Some(ConnCmd::Connect { params, result_tx }) => {
                    set_status(&status_tx, ConnectionStatus::Connecting);
                    let _ = result_tx.send(ConnectionStatus::Connecting);
                    last_params = Some(params.clone());
                    match establish(&params, &timeouts, &handlers).await {
                        Ok((stream, out, inc)) => {
                            hb_out = out;
                            hb_in = inc;
                            recv_window = if hb_in.is_zero() {
                                FAR_FUTURE
                            } else {
                                hb_in * HEARTBEAT_GRACE
                            };
                            send_deadline = TokioInstant::now()
                                + if hb_out.is_zero() { FAR_FUTURE } else { hb_out };
                            recv_deadline = TokioInstant::now() + recv_window;
                            ws = Some(stream);
                            clear_error(&last_error);
                            set_status(&status_tx, ConnectionStatus::Connected);
                            handlers.emit_connect();
                        },
                        Err(e) => {
                            log::warn!("Connection attempt failed: {}", e);
                            record_error(&last_error, &e.to_string());
                            set_status(&status_tx, ConnectionStatus::Error);
                        },
                    }
                },
                Some(ConnCmd::Reconnect) => match last_params.clone() {
                    None => {
                        log::warn!("reconnect() before any connect(); ignoring");
                    },
                    Some(params) => {
                        set_status(&status_tx, ConnectionStatus::Reconnecting);
                        match establish(&params, &timeouts, &handlers).await {
                            Ok((stream, out, inc)) => {
                                hb_out = out;
                                hb_in = inc;
                                recv_window = if hb_in.is_zero() {
                                    FAR_FUTURE
                                } else {
                                    hb_in * HEARTBEAT_GRACE
                                };
                                send_deadline = TokioInstant::now()
                                    + if hb_out.is_zero() { FAR_FUTURE } else { hb_out };
                                recv_deadline = TokioInstant::now() + recv_window;
                                ws = Some(stream);
                                clear_error(&last_error);
                                set_status(&status_tx, ConnectionStatus::Connected);
                                handlers.emit_connect();
                            },
                            Err(e) => {
                                log::warn!("Reconnect attempt failed: {}", e);
                                record_error(&last_error, &e.to_string());
                                set_status(&status_tx, ConnectionStatus::Error);
                            },
                        }
                    },
                },
                Some(ConnCmd::Disconnect) => {
                    // Already down; reset bookkeeping and status.
                    subs.clear();
                    set_status(&status_tx, ConnectionStatus::Disconnected);
                },
                Some(ConnCmd::Publish { destination, .. }) => {
                    log::warn!("publish to '{}' dropped; not connected", destination);
                },
                Some(ConnCmd::Subscribe { destination, result_tx, .. }) => {
                    log::warn!("subscribe to '{}' rejected; not connected", destination);
                    let _ = result_tx.send(None);
                },
                Some(ConnCmd::Unsubscribe { id }) => {
                    log::warn!("unsubscribe '{}' ignored; not connected", id);
                },
                Some(ConnCmd::ListSubscriptions { result_tx }) => {
                    let _ = result_tx.send(snapshot_subscriptions(&subs));
                },
                Some(ConnCmd::Shutdown) | None => {
                    return;
                },
            }
        }
    }
}
