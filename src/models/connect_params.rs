/// Parameters for establishing the realtime connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// WebSocket endpoint URL (`ws://…/ws` or `wss://…/ws`).
    pub url: String,
    /// Access token injected into the CONNECT frame as
    /// `Authorization: Bearer <token>` (connection-level auth, not
    /// per-subscription).
    pub token: String,
}

impl ConnectParams {
    /// Create connect parameters.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}
