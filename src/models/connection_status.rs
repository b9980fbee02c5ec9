use std::fmt;

/// Lifecycle status of the realtime connection.
///
/// Transitions are monotonic within one connect/disconnect cycle:
/// `Disconnected → Connecting → Connected`, with `Reconnecting` replacing
/// `Connecting` on an explicit [`reconnect`](crate::RealtimeConnection::reconnect)
/// and `Error` as the terminal state of a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket; the initial state and the result of `disconnect()`.
    Disconnected,
    /// A first connection attempt is in flight.
    Connecting,
    /// The STOMP session is established.
    Connected,
    /// An explicit reconnect attempt is in flight.
    Reconnecting,
    /// The connection failed; the caller decides whether to reconnect.
    Error,
}

impl ConnectionStatus {
    /// Whether a connect attempt is currently in flight.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}
