//! Dispatcher for `/topic/projects/{id}/tree` frames.

use super::{DispatchError, OnDispatchError};
use crate::models::TreeEvent;
use serde_json::Value;
use std::sync::Arc;

const TAG_FIELD: &str = "type";
const KNOWN_TYPES: [&str; 4] = ["tree:init", "tree:add", "tree:remove", "tree:move"];

/// Parses file-tree frames and routes each one to a typed handler.
#[derive(Clone)]
pub struct TreeDispatcher {
    on_event: Arc<dyn Fn(TreeEvent) + Send + Sync>,
    on_error: Option<OnDispatchError>,
}

impl TreeDispatcher {
    /// Create a dispatcher with the event handler.
    pub fn new(on_event: impl Fn(TreeEvent) + Send + Sync + 'static) -> Self {
        Self {
            on_event: Arc::new(on_event),
            on_error: None,
        }
    }

    /// Register the dispatch-failure callback.
    pub fn on_error(mut self, f: impl Fn(DispatchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Parse one raw frame body and invoke exactly one handler.
    ///
    /// Malformed payloads and unknown `type` values go to `on_error`;
    /// they never propagate to the connection.
    pub fn dispatch(&self, raw: &str) {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                self.emit_error(DispatchError::parse(format!(
                    "Tree payload is not valid JSON: {}",
                    e
                )));
                return;
            },
        };

        let tag = match value.get(TAG_FIELD).and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => {
                self.emit_error(DispatchError::parse(format!(
                    "Tree payload is missing the '{}' field",
                    TAG_FIELD
                )));
                return;
            },
        };

        if !KNOWN_TYPES.contains(&tag.as_str()) {
            self.emit_error(DispatchError::unknown_type(format!(
                "Unrecognized tree event type '{}'",
                tag
            )));
            return;
        }

        match serde_json::from_value::<TreeEvent>(value) {
            Ok(event) => (self.on_event)(event),
            Err(e) => {
                self.emit_error(DispatchError::parse(format!(
                    "Malformed '{}' tree event: {}",
                    tag, e
                )));
            },
        }
    }

    fn emit_error(&self, error: DispatchError) {
        log::warn!("Tree dispatch failed: {}", error);
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}
