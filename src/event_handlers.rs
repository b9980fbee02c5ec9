//! Connection lifecycle event handlers.
//!
//! Callback-based hooks for monitoring the realtime connection:
//!
//! - [`on_connect`](EventHandlers::on_connect): fired when the STOMP session is established
//! - [`on_disconnect`](EventHandlers::on_disconnect): fired when the connection closes
//! - [`on_error`](EventHandlers::on_error): fired on transport or protocol errors
//! - [`on_receive`](EventHandlers::on_receive): optional debug hook for inbound frames
//! - [`on_send`](EventHandlers::on_send): optional debug hook for outbound frames
//!
//! # Example
//!
//! ```rust
//! use atelier_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("connected"))
//!     .on_disconnect(|reason| println!("disconnected: {}", reason))
//!     .on_error(|err| eprintln!("[{}] {}", err.kind, err));
//! ```

use std::fmt;
use std::sync::Arc;

/// Classifies a connection error by the layer it originated from.
///
/// Both kinds flow through the single `on_error` channel; neither is
/// retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Socket-level failure (connect, read/write, heartbeat timeout)
    Websocket,
    /// STOMP-level failure (ERROR frame, malformed frame)
    Stomp,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Websocket => write!(f, "websocket"),
            TransportErrorKind::Stomp => write!(f, "stomp"),
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Which layer produced the error.
    pub kind: TransportErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Raw diagnostic payload (frame body, close reason, ...), when available.
    pub detail: Option<String>,
}

impl ConnectionError {
    /// A socket-level error.
    pub fn websocket(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Websocket,
            message: message.into(),
            detail: None,
        }
    }

    /// A STOMP protocol error.
    pub fn stomp(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Stomp,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach the raw diagnostic payload.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Type alias for the on_connect callback.
pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for the on_disconnect callback.
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Type alias for the on_error callback.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Type alias for the on_receive callback (debug hook for inbound frames).
pub type OnReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Type alias for the on_send callback (debug hook for outbound frames).
pub type OnSendCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Connection lifecycle event handlers.
///
/// All handlers are optional; register only the ones you need. Handlers
/// are `Send + Sync` so they work with the tokio runtime.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnectCallback>,
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnReceiveCallback>,
    pub(crate) on_send: Option<OnSendCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked when the STOMP session is established.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when the connection closes, with a
    /// [`DisconnectReason`] describing why.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked on transport or protocol errors.
    ///
    /// The [`ConnectionError`] carries the layer kind (`websocket` vs
    /// `stomp`), a message, and the raw diagnostic payload when one exists.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw inbound frame.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw outbound frame.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_disconnect.is_some()
            || self.on_error.is_some()
            || self.on_receive.is_some()
            || self.on_send.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_registration() {
        let handlers = EventHandlers::new()
            .on_connect(|| {})
            .on_error(|_| {});

        assert!(handlers.has_any());
        assert!(handlers.on_connect.is_some());
        assert!(handlers.on_disconnect.is_none());
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let handlers = EventHandlers::new();
        handlers.emit_connect();
        handlers.emit_disconnect(DisconnectReason::new("bye"));
        handlers.emit_error(ConnectionError::websocket("boom"));
    }

    #[test]
    fn test_emit_invokes_registered_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handlers = EventHandlers::new().on_error(move |err| {
            assert_eq!(err.kind, TransportErrorKind::Stomp);
            c.fetch_add(1, Ordering::SeqCst);
        });

        handlers.emit_error(ConnectionError::stomp("broker rejected frame"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(TransportErrorKind::Websocket.to_string(), "websocket");
        assert_eq!(TransportErrorKind::Stomp.to_string(), "stomp");
    }

    #[test]
    fn test_disconnect_reason_display() {
        let plain = DisconnectReason::new("server closed");
        assert_eq!(plain.to_string(), "server closed");

        let with_code = DisconnectReason::with_code("abnormal", 1006);
        assert_eq!(with_code.to_string(), "abnormal (code: 1006)");
    }
}
