//! Error types for atelier-link.

use thiserror::Error;

/// Result type for atelier-link operations.
pub type Result<T> = std::result::Result<T, AtelierLinkError>;

/// Errors that can occur when talking to an Atelier server.
///
/// Low-level realtime components (connection, subscriptions, dispatchers)
/// signal expected failures through callbacks or `None` returns instead of
/// this type; only the HTTP client and the client facade return `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtelierLinkError {
    /// Invalid client configuration (bad URL, missing base_url, ...)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Network-level failure (DNS, TCP, TLS, request transport)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Authentication failure (missing/rejected credentials)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The session could not be recovered: token refresh failed and the
    /// user must sign in again.
    #[error("Session expired: sign-in required")]
    SessionExpired,

    /// An operation exceeded its configured timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The API envelope reported failure (`success == false`)
    #[error("API error: {0}")]
    ApiError(String),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// STOMP protocol violation (malformed frame, ERROR frame)
    #[error("STOMP error: {0}")]
    StompError(String),

    /// Non-2xx HTTP response with the server-supplied message when available
    #[error("Server error ({status_code}): {message}")]
    ServerError {
        /// HTTP status code
        status_code: u16,
        /// Server-supplied error message, or the raw body / status text
        message: String,
    },

    /// Invariant violation inside the library
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<reqwest::Error> for AtelierLinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AtelierLinkError::TimeoutError(err.to_string())
        } else if err.is_decode() {
            AtelierLinkError::SerializationError(err.to_string())
        } else {
            AtelierLinkError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AtelierLinkError {
    fn from(err: serde_json::Error) -> Self {
        AtelierLinkError::SerializationError(err.to_string())
    }
}
