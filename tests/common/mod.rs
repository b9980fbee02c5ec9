//! Shared test servers: an in-process STOMP-over-WebSocket shim and an
//! in-process HTTP API server.
//!
//! The shim speaks just enough STOMP for the client under test: it
//! answers CONNECT with CONNECTED, tracks SUBSCRIBE/UNSUBSCRIBE per
//! connection, records SEND frames, and delivers scripted MESSAGE/ERROR
//! frames on command. Subscriptions are per-connection, like a real
//! broker: a reconnect starts from a clean slate.

#![allow(dead_code)]

use atelier_link::stomp::{Command, Frame};
use atelier_link::{ConnectionStatus, RealtimeConnection};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;

// ── Polling helpers ─────────────────────────────────────────────────────────

/// Wait until the connection reports `want`, or `dur` elapses.
pub async fn wait_for_status(
    conn: &RealtimeConnection,
    want: ConnectionStatus,
    dur: Duration,
) -> bool {
    let mut rx = conn.status_stream();
    let fut = async {
        loop {
            if *rx.borrow_and_update() == want {
                return true;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow() == want;
            }
        }
    };
    tokio::time::timeout(dur, fut).await.unwrap_or(false)
}

/// Poll `cond` until it holds or `dur` elapses.
pub async fn wait_until(cond: impl Fn() -> bool, dur: Duration) -> bool {
    let deadline = Instant::now() + dur;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

// ── STOMP shim ──────────────────────────────────────────────────────────────

/// Scripted server actions.
#[derive(Debug, Clone)]
pub enum ShimCommand {
    /// Deliver a MESSAGE frame on `destination` to whichever connection
    /// has it subscribed.
    Message { destination: String, body: String },
    /// Send a STOMP ERROR frame.
    Error { message: String },
    /// Close the WebSocket.
    Close,
}

/// Observations recorded by the shim.
#[derive(Debug, Clone)]
pub enum ShimEvent {
    /// A CONNECT frame arrived; carries the Authorization header value.
    Connected { authorization: Option<String> },
    /// A SUBSCRIBE frame arrived.
    Subscribed { id: String, destination: String },
    /// An UNSUBSCRIBE frame arrived.
    Unsubscribed { id: String },
    /// A SEND frame arrived.
    Sent { destination: String, body: String },
    /// The client sent DISCONNECT or the socket closed.
    Disconnected,
}

/// In-process STOMP-over-WebSocket test server.
pub struct StompShim {
    /// `ws://…/ws` endpoint of the shim.
    pub url: String,
    /// Raw listen address (for deriving an `http://` base URL).
    pub addr: SocketAddr,
    cmd_tx: broadcast::Sender<ShimCommand>,
    events_rx: Mutex<mpsc::UnboundedReceiver<ShimEvent>>,
}

/// Route test logs through env_logger (`RUST_LOG=debug cargo test`).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl StompShim {
    /// Spawn a shim whose CONNECTED frame disables heartbeats.
    pub async fn spawn() -> Self {
        Self::spawn_with_heart_beat("0,0").await
    }

    /// Spawn a shim advertising the given `heart-beat` header.
    pub async fn spawn_with_heart_beat(heart_beat: &str) -> Self {
        init_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (cmd_tx, _) = broadcast::channel(64);
        let (event_tx, events_rx) = mpsc::unbounded_channel();

        let accept_cmd_tx = cmd_tx.clone();
        let heart_beat = heart_beat.to_string();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                tokio::spawn(handle_connection(
                    stream,
                    accept_cmd_tx.subscribe(),
                    event_tx.clone(),
                    heart_beat.clone(),
                ));
            }
        });

        Self {
            url: format!("ws://{}/ws", addr),
            addr,
            cmd_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    /// Deliver a MESSAGE frame to the subscriber of `destination`.
    pub fn send_message(&self, destination: &str, body: &str) {
        let _ = self.cmd_tx.send(ShimCommand::Message {
            destination: destination.to_string(),
            body: body.to_string(),
        });
    }

    /// Send a STOMP ERROR frame.
    pub fn send_error(&self, message: &str) {
        let _ = self.cmd_tx.send(ShimCommand::Error {
            message: message.to_string(),
        });
    }

    /// Close the live connection.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(ShimCommand::Close);
    }

    /// Next recorded event, or `None` after `dur`.
    pub async fn next_event(&self, dur: Duration) -> Option<ShimEvent> {
        let mut rx = self.events_rx.lock().await;
        tokio::time::timeout(dur, rx.recv()).await.ok().flatten()
    }

    /// Wait for the first event matching `pred`.
    pub async fn wait_for(
        &self,
        pred: impl Fn(&ShimEvent) -> bool,
        dur: Duration,
    ) -> Option<ShimEvent> {
        let deadline = Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.next_event(remaining).await {
                Some(event) if pred(&event) => return Some(event),
                Some(_) => continue,
                None => return None,
            }
        }
    }

    /// Drain every event arriving within `dur`.
    pub async fn collect_events(&self, dur: Duration) -> Vec<ShimEvent> {
        let mut events = Vec::new();
        let deadline = Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return events;
            }
            match self.next_event(remaining).await {
                Some(event) => events.push(event),
                None => return events,
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut cmd_rx: broadcast::Receiver<ShimCommand>,
    event_tx: mpsc::UnboundedSender<ShimEvent>,
    heart_beat: String,
) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    // destination -> subscription id, for this connection only
    let mut subs: HashMap<String, String> = HashMap::new();
    let mut msg_seq = 0u64;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Ok(ShimCommand::Message { destination, body }) => {
                        if let Some(id) = subs.get(&destination) {
                            msg_seq += 1;
                            let frame = Frame::new(Command::Message)
                                .header("destination", destination.clone())
                                .header("subscription", id.clone())
                                .header("message-id", format!("msg-{}", msg_seq))
                                .body(body);
                            if ws.send(Message::Text(frame.serialize().into())).await.is_err() {
                                return;
                            }
                        }
                    },
                    Ok(ShimCommand::Error { message }) => {
                        let frame = Frame::new(Command::Error).header("message", message);
                        let _ = ws.send(Message::Text(frame.serialize().into())).await;
                    },
                    Ok(ShimCommand::Close) => {
                        let _ = ws.close(None).await;
                        return;
                    },
                    Err(_) => return,
                }
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let parsed = match Frame::parse(text.as_str()) {
                            Ok(Some(frame)) => frame,
                            _ => continue, // heartbeat or garbage
                        };
                        match parsed.command {
                            Command::Connect => {
                                let _ = event_tx.send(ShimEvent::Connected {
                                    authorization: parsed
                                        .header_value("Authorization")
                                        .map(str::to_string),
                                });
                                let connected = Frame::new(Command::Connected)
                                    .header("version", "1.2")
                                    .header("heart-beat", heart_beat.clone());
                                if ws
                                    .send(Message::Text(connected.serialize().into()))
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            },
                            Command::Subscribe => {
                                let id = parsed.header_value("id").unwrap_or_default().to_string();
                                let destination = parsed
                                    .header_value("destination")
                                    .unwrap_or_default()
                                    .to_string();
                                subs.insert(destination.clone(), id.clone());
                                let _ = event_tx.send(ShimEvent::Subscribed { id, destination });
                            },
                            Command::Unsubscribe => {
                                let id = parsed.header_value("id").unwrap_or_default().to_string();
                                subs.retain(|_, v| v != &id);
                                let _ = event_tx.send(ShimEvent::Unsubscribed { id });
                            },
                            Command::Send => {
                                let _ = event_tx.send(ShimEvent::Sent {
                                    destination: parsed
                                        .header_value("destination")
                                        .unwrap_or_default()
                                        .to_string(),
                                    body: parsed.body,
                                });
                            },
                            Command::Disconnect => {
                                let _ = event_tx.send(ShimEvent::Disconnected);
                            },
                            _ => {},
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = event_tx.send(ShimEvent::Disconnected);
                        return;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(_)) => return,
                }
            }
        }
    }
}

// ── HTTP API server ─────────────────────────────────────────────────────────

/// Token the API accepts on protected endpoints, and the one the refresh
/// endpoint hands out.
pub const FRESH_TOKEN: &str = "fresh-token";

/// How long the refresh endpoint stalls before answering; widens the
/// window in which concurrent 401 handlers can pile onto one refresh.
pub const REFRESH_DELAY: Duration = Duration::from_millis(250);

/// Shared state of the in-process API server.
pub struct ApiServerState {
    /// Number of requests the refresh endpoint has received.
    pub refresh_calls: AtomicUsize,
    /// When true the refresh endpoint answers 500.
    pub refresh_fail: AtomicBool,
}

async fn refresh_handler(State(state): State<Arc<ApiServerState>>) -> impl IntoResponse {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if state.refresh_fail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "refresh unavailable"})),
        );
    }
    tokio::time::sleep(REFRESH_DELAY).await;
    (StatusCode::OK, Json(json!({"accessToken": FRESH_TOKEN})))
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn project_handler(headers: HeaderMap) -> impl IntoResponse {
    if bearer(&headers).as_deref() == Some(FRESH_TOKEN) {
        (
            StatusCode::OK,
            Json(json!({"success": true, "data": {"id": 7, "name": "atelier"}})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "unauthorized"})),
        )
    }
}

async fn bad_handler() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": "boom"})),
    )
}

async fn empty_success_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"success": true})))
}

/// Spawn the API server; returns its base URL and shared state.
pub async fn spawn_api_server() -> (String, Arc<ApiServerState>) {
    init_logging();
    let state = Arc::new(ApiServerState {
        refresh_calls: AtomicUsize::new(0),
        refresh_fail: AtomicBool::new(false),
    });

    let app = Router::new()
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/projects/7", get(project_handler))
        .route("/api/bad", get(bad_handler))
        .route("/api/empty-success", get(empty_success_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), state)
}
