//! Chat message list, updated from `/topic/projects/{id}/chat` events.

use crate::models::{ChatMessage, ChatMessageType};
use chrono::{DateTime, Utc};

/// How an entry should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEntryKind {
    /// A participant's chat message (`TALK`).
    Message,
    /// A join/leave notice (`ENTER`/`LEAVE`); rendered inline but not
    /// chat content.
    System,
}

/// One rendered entry in the chat view.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    /// Entry kind.
    pub kind: ChatEntryKind,
    /// Originating participant.
    pub username: String,
    /// Rendered text.
    pub content: String,
    /// Server-side timestamp of the originating event.
    pub sent_at: DateTime<Utc>,
}

/// Ordered chat history for one project.
///
/// Events are applied in the order the transport delivers them; applying
/// the same ordered stream to a fresh log always yields the same entries.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one incoming chat event, appending exactly one entry.
    pub fn apply(&mut self, msg: &ChatMessage) {
        let entry = match msg.message_type {
            ChatMessageType::Talk => ChatEntry {
                kind: ChatEntryKind::Message,
                username: msg.username.clone(),
                content: msg.content.clone(),
                sent_at: msg.sent_at,
            },
            ChatMessageType::Enter => ChatEntry {
                kind: ChatEntryKind::System,
                username: msg.username.clone(),
                content: format!("{} joined the project", msg.username),
                sent_at: msg.sent_at,
            },
            ChatMessageType::Leave => ChatEntry {
                kind: ChatEntryKind::System,
                username: msg.username.clone(),
                content: format!("{} left the project", msg.username),
                sent_at: msg.sent_at,
            },
        };
        self.entries.push(entry);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Only the `TALK` entries (the persisted chat content).
    pub fn messages(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == ChatEntryKind::Message)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries (e.g. when switching projects).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
