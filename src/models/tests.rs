use super::*;
use crate::error::AtelierLinkError;
use serde_json::json;

// ==================== ChatMessage Tests ====================

#[test]
fn test_chat_message_talk_deserialization() {
    let raw = r#"{
        "messageType": "TALK",
        "projectId": 42,
        "username": "alice",
        "content": "hi",
        "sentAt": "2025-01-01T00:00:00Z"
    }"#;

    let msg: ChatMessage = serde_json::from_str(raw).unwrap();
    assert_eq!(msg.message_type, ChatMessageType::Talk);
    assert_eq!(msg.project_id, 42);
    assert_eq!(msg.username, "alice");
    assert_eq!(msg.content, "hi");
    assert_eq!(msg.sent_at.to_rfc3339(), "2025-01-01T00:00:00+00:00");
}

#[test]
fn test_chat_message_enter_allows_missing_content() {
    let raw = r#"{
        "messageType": "ENTER",
        "projectId": 7,
        "username": "bob",
        "sentAt": "2025-03-04T12:30:00Z"
    }"#;

    let msg: ChatMessage = serde_json::from_str(raw).unwrap();
    assert_eq!(msg.message_type, ChatMessageType::Enter);
    assert!(msg.content.is_empty());
}

#[test]
fn test_chat_message_type_wire_names() {
    assert_eq!(
        serde_json::to_string(&ChatMessageType::Enter).unwrap(),
        r#""ENTER""#
    );
    assert_eq!(
        serde_json::to_string(&ChatMessageType::Talk).unwrap(),
        r#""TALK""#
    );
    assert_eq!(
        serde_json::to_string(&ChatMessageType::Leave).unwrap(),
        r#""LEAVE""#
    );
}

#[test]
fn test_talk_payload_serialization() {
    let payload = TalkPayload {
        content: "hello world".to_string(),
    };
    assert_eq!(
        serde_json::to_string(&payload).unwrap(),
        r#"{"content":"hello world"}"#
    );
}

// ==================== TreeEvent Tests ====================

#[test]
fn test_tree_add_deserialization() {
    let raw = r#"{"type":"tree:add","payload":{"path":"/src/x.ts","type":"file"}}"#;
    let event: TreeEvent = serde_json::from_str(raw).unwrap();

    match event {
        TreeEvent::Add(node) => {
            assert_eq!(node.path, "/src/x.ts");
            assert_eq!(node.kind, NodeKind::File);
            assert!(node.children.is_empty());
        },
        other => panic!("expected tree:add, got {:?}", other),
    }
}

#[test]
fn test_tree_remove_deserialization() {
    let raw = r#"{"type":"tree:remove","payload":{"path":"/src/x.ts"}}"#;
    let event: TreeEvent = serde_json::from_str(raw).unwrap();

    assert_eq!(
        event,
        TreeEvent::Remove(TreeRemovePayload {
            path: "/src/x.ts".to_string()
        })
    );
}

#[test]
fn test_tree_move_deserialization() {
    let raw = r#"{"type":"tree:move","payload":{"fromPath":"/a.rs","toPath":"/src/a.rs"}}"#;
    let event: TreeEvent = serde_json::from_str(raw).unwrap();

    assert_eq!(
        event,
        TreeEvent::Move(TreeMovePayload {
            from_path: "/a.rs".to_string(),
            to_path: "/src/a.rs".to_string()
        })
    );
}

#[test]
fn test_tree_init_deserialization() {
    let raw = json!({
        "type": "tree:init",
        "payload": {
            "/src": {"path": "/src", "type": "directory", "children": ["/src/main.rs"]},
            "/src/main.rs": {"path": "/src/main.rs", "type": "file"}
        }
    });

    let event: TreeEvent = serde_json::from_value(raw).unwrap();
    match event {
        TreeEvent::Init(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map["/src"].kind, NodeKind::Directory);
            assert_eq!(map["/src"].children, vec!["/src/main.rs".to_string()]);
        },
        other => panic!("expected tree:init, got {:?}", other),
    }
}

#[test]
fn test_tree_event_unknown_type_is_error() {
    let raw = r#"{"type":"tree:chmod","payload":{"path":"/x"}}"#;
    assert!(serde_json::from_str::<TreeEvent>(raw).is_err());
}

#[test]
fn test_file_node_name() {
    assert_eq!(FileNode::file("/src/x.ts").name(), "x.ts");
    assert_eq!(FileNode::directory("/src").name(), "src");
}

// ==================== ApiResponse Tests ====================

#[test]
fn test_api_response_extract_data_success() {
    let resp: ApiResponse<u32> =
        serde_json::from_str(r#"{"success":true,"data":5}"#).unwrap();
    assert_eq!(resp.extract_data().unwrap(), 5);
}

#[test]
fn test_api_response_extract_data_fails_without_data() {
    let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
    assert!(matches!(
        resp.extract_data(),
        Err(AtelierLinkError::SerializationError(_))
    ));
}

#[test]
fn test_api_response_extract_data_fails_on_error_envelope() {
    let resp: ApiResponse<u32> =
        serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
    match resp.extract_data() {
        Err(AtelierLinkError::ApiError(message)) => assert_eq!(message, "nope"),
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[test]
fn test_api_response_check_success_ignores_missing_data() {
    let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
    assert!(resp.check_success().is_ok());
}

#[test]
fn test_api_response_check_success_fails_on_error() {
    let resp: ApiResponse<u32> =
        serde_json::from_str(r#"{"success":false,"error":"denied"}"#).unwrap();
    assert!(resp.check_success().is_err());
}

// ==================== RefreshResponse Tests ====================

#[test]
fn test_refresh_response_wire_name() {
    let resp: RefreshResponse =
        serde_json::from_str(r#"{"accessToken":"tok-123"}"#).unwrap();
    assert_eq!(resp.access_token, "tok-123");
}

// ==================== ConnectionStatus Tests ====================

#[test]
fn test_connection_status_display() {
    assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
    assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
}

#[test]
fn test_connection_status_is_pending() {
    assert!(ConnectionStatus::Connecting.is_pending());
    assert!(ConnectionStatus::Reconnecting.is_pending());
    assert!(!ConnectionStatus::Connected.is_pending());
    assert!(!ConnectionStatus::Error.is_pending());
}
