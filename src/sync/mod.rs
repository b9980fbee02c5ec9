//! Client-side domain state kept in sync by incoming topic events.

mod chat;
mod tree;

pub use chat::{ChatEntry, ChatEntryKind, ChatLog};
pub use tree::FileTree;
