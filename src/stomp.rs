//! STOMP 1.2 frame codec.
//!
//! Atelier's realtime wire format is STOMP over WebSocket text frames.
//! This module owns the frame grammar: command line, headers with the
//! STOMP 1.2 escape sequences, an optional body terminated by a NUL
//! octet, and bare-EOL heartbeat frames.
//!
//! The codec is deliberately transport-agnostic: it maps `&str` to
//! [`Frame`] and back, and leaves socket I/O to the connection task.

use crate::error::{AtelierLinkError, Result};
use std::fmt;
use std::time::Duration;

/// Protocol version sent in `accept-version` and expected from the server.
pub const STOMP_VERSION: &str = "1.2";

/// STOMP frame commands used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Client → server connection handshake
    Connect,
    /// Server → client handshake acknowledgement
    Connected,
    /// Client → server topic registration
    Subscribe,
    /// Client → server topic release
    Unsubscribe,
    /// Client → server message publish
    Send,
    /// Server → client message delivery
    Message,
    /// Server → client protocol error (terminal)
    Error,
    /// Client → server graceful shutdown
    Disconnect,
    /// Server → client receipt acknowledgement
    Receipt,
}

impl Command {
    /// The wire spelling of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
            Command::Receipt => "RECEIPT",
        }
    }

    fn from_wire(s: &str) -> Option<Command> {
        match s {
            "CONNECT" => Some(Command::Connect),
            "CONNECTED" => Some(Command::Connected),
            "SUBSCRIBE" => Some(Command::Subscribe),
            "UNSUBSCRIBE" => Some(Command::Unsubscribe),
            "SEND" => Some(Command::Send),
            "MESSAGE" => Some(Command::Message),
            "ERROR" => Some(Command::Error),
            "DISCONNECT" => Some(Command::Disconnect),
            "RECEIPT" => Some(Command::Receipt),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// Headers keep insertion order; per STOMP 1.2, when a header repeats the
/// first occurrence wins, which is what [`Frame::header_value`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command
    pub command: Command,
    /// Ordered header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Frame body (empty for most client frames)
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body (builder style).
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value for `name`, if present (first-wins per STOMP 1.2).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to the wire representation, NUL terminator included.
    ///
    /// A `content-length` header is appended automatically when the body
    /// is non-empty.
    pub fn serialize(&self) -> String {
        let escape = !matches!(self.command, Command::Connect | Command::Connected);
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame from a WebSocket text payload.
    ///
    /// Returns `Ok(None)` for heartbeat frames (payloads consisting only
    /// of EOLs, including the empty string).
    pub fn parse(text: &str) -> Result<Option<Frame>> {
        if text.chars().all(|c| c == '\n' || c == '\r') {
            return Ok(None);
        }

        let mut rest = text;

        let command_line = take_line(&mut rest).ok_or_else(|| {
            AtelierLinkError::StompError("Frame is missing a command line".to_string())
        })?;
        let command = Command::from_wire(command_line).ok_or_else(|| {
            AtelierLinkError::StompError(format!("Unknown STOMP command '{}'", command_line))
        })?;
        let unescape = !matches!(command, Command::Connect | Command::Connected);

        let mut headers = Vec::new();
        loop {
            let line = take_line(&mut rest).ok_or_else(|| {
                AtelierLinkError::StompError("Frame ended inside the header block".to_string())
            })?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                AtelierLinkError::StompError(format!("Malformed header line '{}'", line))
            })?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let body_end = rest.find('\0').ok_or_else(|| {
            AtelierLinkError::StompError("Frame is missing the NUL terminator".to_string())
        })?;
        let body = rest[..body_end].to_string();

        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }
}

/// Take the next line off `rest`, consuming the EOL. Accepts `\n` and `\r\n`.
fn take_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let idx = rest.find('\n')?;
    let line = &rest[..idx];
    *rest = &rest[idx + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(AtelierLinkError::StompError(format!(
                    "Invalid header escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            },
        }
    }
    Ok(out)
}

/// Parse a `heart-beat` header value (`"sx,sy"` in milliseconds).
pub fn parse_heart_beat(value: &str) -> Option<(u64, u64)> {
    let (sx, sy) = value.split_once(',')?;
    Some((sx.trim().parse().ok()?, sy.trim().parse().ok()?))
}

/// Negotiate effective heartbeat intervals against the server's
/// CONNECTED `heart-beat` header.
///
/// `client_out_ms`/`client_in_ms` are what the client offered in its
/// CONNECT frame. Returns `(outgoing, incoming)`: the interval at which
/// the client must emit heartbeats, and the interval at which it may
/// expect server activity. Zero on either side disables that direction,
/// and a missing server header means the server opted out entirely.
pub fn negotiate_heart_beat(
    client_out_ms: u64,
    client_in_ms: u64,
    server_header: Option<&str>,
) -> (Duration, Duration) {
    let (server_out_ms, server_in_ms) = server_header
        .and_then(parse_heart_beat)
        .unwrap_or((0, 0));

    let outgoing = if client_out_ms == 0 || server_in_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(client_out_ms.max(server_in_ms))
    };
    let incoming = if client_in_ms == 0 || server_out_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(client_in_ms.max(server_out_ms))
    };
    (outgoing, incoming)
}
