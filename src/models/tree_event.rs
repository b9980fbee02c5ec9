use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a tree node is a file or a directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf node.
    File,
    /// Container node; carries an ordered list of child paths.
    Directory,
}

/// One entry in the flat file-tree map, keyed by its path.
///
/// The flat representation keeps lookup and update O(1); hierarchy is
/// expressed through `children` path lists on directories instead of
/// nesting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Absolute path within the project, e.g. `/src/main.rs`.
    pub path: String,
    /// Node kind.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Ordered child paths; always empty for files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl FileNode {
    /// Create a file node.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    /// Create a directory node.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Payload of a `tree:remove` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TreeRemovePayload {
    /// Path of the node to delete.
    pub path: String,
}

/// Payload of a `tree:move` event.
///
/// Operates on a single node; descendants are not rewritten (the server
/// re-sends them when a directory moves), matching the no-cascade
/// behavior of `tree:remove`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TreeMovePayload {
    /// Current path of the node.
    pub from_path: String,
    /// New path of the node.
    pub to_path: String,
}

/// A message delivered on `/topic/projects/{id}/tree`.
///
/// Exactly one variant is active per message, selected by the `type`
/// field; the variant data rides in `payload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum TreeEvent {
    /// Replace the entire flat node map.
    #[serde(rename = "tree:init")]
    Init(HashMap<String, FileNode>),
    /// Insert a node and link it into its parent's children.
    #[serde(rename = "tree:add")]
    Add(FileNode),
    /// Delete a node. Orphaned children are the caller's responsibility.
    #[serde(rename = "tree:remove")]
    Remove(TreeRemovePayload),
    /// Remove the node at the old path and insert it at the new path.
    #[serde(rename = "tree:move")]
    Move(TreeMovePayload),
}
