//! Timeout and heartbeat configuration for atelier-link operations.

use std::time::Duration;

/// Timeout configuration for Atelier client operations.
///
/// Covers the HTTP request path, WebSocket establishment, the STOMP
/// handshake, and the bidirectional heartbeat contract (20 s in / 20 s
/// out by default).
///
/// # Examples
///
/// ```rust
/// use atelier_link::AtelierLinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = AtelierLinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = AtelierLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(30))
///     .request_timeout(Duration::from_secs(60))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct AtelierLinkTimeouts {
    /// Timeout for establishing connections (TCP + TLS + WebSocket upgrade).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for the STOMP CONNECT/CONNECTED handshake after the socket
    /// is open.
    /// Default: 5 seconds
    pub handshake_timeout: Duration,

    /// Overall timeout for an HTTP request/response cycle.
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Interval offered to the server for client→server heartbeats.
    /// Set to zero to opt out of sending heartbeats.
    /// Default: 20 seconds
    pub heartbeat_outgoing: Duration,

    /// Interval offered to the server for server→client heartbeats.
    /// Silence for twice the negotiated interval marks the socket dead.
    /// Set to zero to opt out of liveness checking.
    /// Default: 20 seconds
    pub heartbeat_incoming: Duration,
}

impl Default for AtelierLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            heartbeat_outgoing: Duration::from_secs(20),
            heartbeat_incoming: Duration::from_secs(20),
        }
    }
}

impl AtelierLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> AtelierLinkTimeoutsBuilder {
        AtelierLinkTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            heartbeat_outgoing: Duration::from_secs(5),
            heartbeat_incoming: Duration::from_secs(5),
        }
    }

    /// Timeouts for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(120),
            heartbeat_outgoing: Duration::from_secs(30),
            heartbeat_incoming: Duration::from_secs(30),
        }
    }
}

/// Builder for [`AtelierLinkTimeouts`].
#[derive(Debug, Clone)]
pub struct AtelierLinkTimeoutsBuilder {
    timeouts: AtelierLinkTimeouts,
}

impl AtelierLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: AtelierLinkTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS + WebSocket upgrade).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the STOMP handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake_timeout = timeout;
        self
    }

    /// Set the HTTP request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Set the outgoing heartbeat interval. Zero disables.
    pub fn heartbeat_outgoing(mut self, interval: Duration) -> Self {
        self.timeouts.heartbeat_outgoing = interval;
        self
    }

    /// Set the incoming heartbeat expectation. Zero disables.
    pub fn heartbeat_incoming(mut self, interval: Duration) -> Self {
        self.timeouts.heartbeat_incoming = interval;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> AtelierLinkTimeouts {
        self.timeouts
    }
}
