//! Flat file-tree map, updated from `/topic/projects/{id}/tree` events.

use crate::models::{FileNode, NodeKind, TreeEvent};
use std::collections::HashMap;

/// Project file tree as a flat path→node map.
///
/// Hierarchy lives in each directory's ordered `children` list, so
/// lookup, insert and delete stay O(1) regardless of depth.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    nodes: HashMap<String, FileNode>,
}

impl FileTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one incoming tree event.
    ///
    /// `add` is idempotent (re-adding a path overwrites the node without
    /// duplicating the parent link); `remove` of an absent path and
    /// `move` of an absent source are no-ops. Removing a directory does
    /// not cascade to its children; the server sends explicit removes.
    pub fn apply(&mut self, event: &TreeEvent) {
        match event {
            TreeEvent::Init(map) => {
                self.nodes = map.clone();
            },
            TreeEvent::Add(node) => {
                self.insert_node(node.clone());
            },
            TreeEvent::Remove(payload) => {
                if self.remove_node(&payload.path).is_none() {
                    log::warn!("tree:remove for unknown path '{}'", payload.path);
                }
            },
            TreeEvent::Move(payload) => {
                match self.remove_node(&payload.from_path) {
                    Some(mut node) => {
                        node.path = payload.to_path.clone();
                        self.insert_node(node);
                    },
                    None => {
                        log::warn!(
                            "tree:move for unknown path '{}' (target '{}')",
                            payload.from_path,
                            payload.to_path
                        );
                    },
                }
            },
        }
    }

    /// Look up a node by path.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    /// Whether a node exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// The full flat map.
    pub fn nodes(&self) -> &HashMap<String, FileNode> {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert_node(&mut self, node: FileNode) {
        let path = node.path.clone();
        self.nodes.insert(path.clone(), node);
        if let Some(parent) = parent_path(&path) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                if parent_node.kind == NodeKind::Directory
                    && !parent_node.children.contains(&path)
                {
                    parent_node.children.push(path);
                }
            }
        }
    }

    fn remove_node(&mut self, path: &str) -> Option<FileNode> {
        let node = self.nodes.remove(path)?;
        if let Some(parent) = parent_path(path) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|child| child != path);
            }
        }
        Some(node)
    }
}

/// Parent of `/src/x.ts` is `/src`; top-level entries have no parent.
fn parent_path(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}
