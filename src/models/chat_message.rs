use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for chat topic messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatMessageType {
    /// A participant joined the project (system notice, not chat content).
    Enter,
    /// A chat message (appended to the message list).
    Talk,
    /// A participant left the project (system notice, not chat content).
    Leave,
}

/// A message delivered on `/topic/projects/{id}/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Which variant this message is (`ENTER`, `TALK`, `LEAVE`).
    pub message_type: ChatMessageType,
    /// Project the message belongs to.
    pub project_id: u64,
    /// Sender (or joining/leaving participant).
    pub username: String,
    /// Message body; empty for ENTER/LEAVE.
    #[serde(default)]
    pub content: String,
    /// Server-side send timestamp.
    pub sent_at: DateTime<Utc>,
}

/// Body published to `/app/projects/{id}/chat/talk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TalkPayload {
    /// Chat message content.
    pub content: String,
}
