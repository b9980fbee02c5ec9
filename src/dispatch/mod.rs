//! Per-domain message dispatchers.
//!
//! A dispatcher takes the raw body of a MESSAGE frame, parses it into the
//! domain's envelope type, and invokes exactly one typed handler. Parsing
//! failures and unknown envelope types are reported through the
//! dispatcher's own `on_error` callback; they are per-message failures
//! and never touch the connection.

mod chat;
mod tree;

pub use chat::ChatDispatcher;
pub use tree::TreeDispatcher;

use std::fmt;
use std::sync::Arc;

/// Classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// The payload was not valid JSON, the tag field was missing, or a
    /// known variant failed to deserialize.
    Parse,
    /// The tag field carried a value this domain does not know.
    UnknownType,
}

impl fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchErrorKind::Parse => write!(f, "parse"),
            DispatchErrorKind::UnknownType => write!(f, "unknown-type"),
        }
    }
}

/// A per-message dispatch failure.
#[derive(Debug, Clone)]
pub struct DispatchError {
    /// Failure classification.
    pub kind: DispatchErrorKind,
    /// Domain-specific description.
    pub message: String,
}

impl DispatchError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: DispatchErrorKind::Parse,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_type(message: impl Into<String>) -> Self {
        Self {
            kind: DispatchErrorKind::UnknownType,
            message: message.into(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Callback type for dispatch failures.
pub type OnDispatchError = Arc<dyn Fn(DispatchError) + Send + Sync>;
