//! Dispatcher for `/topic/projects/{id}/chat` frames.

use super::{DispatchError, OnDispatchError};
use crate::models::ChatMessage;
use serde_json::Value;
use std::sync::Arc;

const TAG_FIELD: &str = "messageType";
const KNOWN_TYPES: [&str; 3] = ["ENTER", "TALK", "LEAVE"];

/// Parses chat frames and routes each one to a typed handler.
///
/// Clone is cheap (the handlers are shared), so the same dispatcher can
/// back a subscription closure and stay inspectable from the caller.
#[derive(Clone)]
pub struct ChatDispatcher {
    on_message: Arc<dyn Fn(ChatMessage) + Send + Sync>,
    on_error: Option<OnDispatchError>,
}

impl ChatDispatcher {
    /// Create a dispatcher with the message handler.
    pub fn new(on_message: impl Fn(ChatMessage) + Send + Sync + 'static) -> Self {
        Self {
            on_message: Arc::new(on_message),
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
    /// Malformed payloads and unknown `messageType` values go to
    /// `on_error`; they never propagate to the connection.
    pub fn dispatch(&self, raw: &str) {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                self.emit_error(DispatchError::parse(format!(
                    "Chat payload is not valid JSON: {}",
                    e
                )));
                return;
            },
        };

        let tag = match value.get(TAG_FIELD).and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => {
                self.emit_error(DispatchError::parse(format!(
                    "Chat payload is missing the '{}' field",
                    TAG_FIELD
                )));
                return;
            },
        };

        if !KNOWN_TYPES.contains(&tag.as_str()) {
            self.emit_error(DispatchError::unknown_type(format!(
                "Unrecognized chat message type '{}'",
                tag
            )));
            return;
        }

        match serde_json::from_value::<ChatMessage>(value) {
            Ok(msg) => (self.on_message)(msg),
            Err(e) => {
                self.emit_error(DispatchError::parse(format!(
                    "Malformed '{}' chat message: {}",
                    tag, e
                )));
            },
        }
    }

    fn emit_error(&self, error: DispatchError) {
        log::warn!("Chat dispatch failed: {}", error);
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchErrorKind;
    use crate::models::ChatMessageType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting_dispatcher() -> (
        ChatDispatcher,
        Arc<Mutex<Vec<ChatMessage>>>,
        Arc<Mutex<Vec<DispatchError>>>,
    ) {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let m = messages.clone();
        let e = errors.clone();
        let dispatcher = ChatDispatcher::new(move |msg| m.lock().unwrap().push(msg))
            .on_error(move |err| e.lock().unwrap().push(err));
        (dispatcher, messages, errors)
    }

    const TALK: &str = r#"{"messageType":"TALK","projectId":42,"username":"alice","content":"hi","sentAt":"2025-01-01T00:00:00Z"}"#;

    #[test]
    fn test_talk_invokes_handler_exactly_once() {
        let (dispatcher, messages, errors) = counting_dispatcher();
        dispatcher.dispatch(TALK);

        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, ChatMessageType::Talk);
        assert_eq!(messages[0].content, "hi");
        assert!(errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_reports_parse_error() {
        let (dispatcher, messages, errors) = counting_dispatcher();
        dispatcher.dispatch("{not json");

        assert!(messages.lock().unwrap().is_empty());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DispatchErrorKind::Parse);
    }

    #[test]
    fn test_missing_tag_reports_parse_error() {
        let (dispatcher, _, errors) = counting_dispatcher();
        dispatcher.dispatch(r#"{"projectId":42,"username":"alice"}"#);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DispatchErrorKind::Parse);
    }

    #[test]
    fn test_unknown_type_reports_exactly_once_and_keeps_state() {
        let (dispatcher, messages, errors) = counting_dispatcher();
        dispatcher.dispatch(TALK);
        dispatcher.dispatch(r#"{"messageType":"SHOUT","projectId":42,"username":"x","sentAt":"2025-01-01T00:00:00Z"}"#);

        // The earlier TALK result is untouched, the bad frame reported once.
        assert_eq!(messages.lock().unwrap().len(), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DispatchErrorKind::UnknownType);
    }

    #[test]
    fn test_known_tag_with_bad_shape_is_parse_error() {
        let (dispatcher, _, errors) = counting_dispatcher();
        // projectId has the wrong type
        dispatcher.dispatch(r#"{"messageType":"TALK","projectId":"forty-two","username":"a","sentAt":"2025-01-01T00:00:00Z"}"#);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DispatchErrorKind::Parse);
    }

    #[test]
    fn test_dispatch_without_error_handler_does_not_panic() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let dispatcher = ChatDispatcher::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.dispatch("not json at all");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
