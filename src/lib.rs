//! # atelier-link: Atelier Client Sync Library
//!
//! The client-side synchronization layer of the Atelier collaboration
//! platform: a STOMP-over-WebSocket realtime client plus an
//! authenticated HTTP API client.
//!
//! ## Features
//!
//! - **Realtime subscriptions**: one shared STOMP connection multiplexing
//!   topic subscriptions, with bidirectional heartbeats and explicit,
//!   caller-driven reconnection (no hidden retry storms)
//! - **Typed dispatch**: chat and file-tree frames parsed into typed
//!   events and routed to domain handlers; malformed messages are
//!   isolated failures, never connection-fatal
//! - **Domain state**: an ordered chat log and a flat file-tree map kept
//!   in sync by incoming events
//! - **Token refresh coordination**: any number of concurrent 401s
//!   produce exactly one call to the refresh endpoint
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use atelier_link::{AtelierLinkClient, ChatDispatcher, EventHandlers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AtelierLinkClient::builder()
//!         .base_url("https://atelier.example")
//!         .access_token("eyJhbGc...")
//!         .event_handlers(EventHandlers::new().on_connect(|| println!("live")))
//!         .build()?;
//!
//!     client.connect_realtime().await?;
//!
//!     let chat = ChatDispatcher::new(|msg| println!("[{}] {}", msg.username, msg.content));
//!     client.subscribe_chat(42, chat).await;
//!     client.publish_chat(42, "hello").await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Reconnection model
//!
//! The connection never reconnects by itself. When it drops, the status
//! moves to `Disconnected`/`Error`, all subscriptions are invalidated,
//! and the application decides whether and when to call
//! [`RealtimeConnection::reconnect`]; then re-subscribes.

pub mod api;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod stomp;
pub mod sync;
pub mod timeouts;

// Re-export main types for convenience
pub use api::{ApiClient, SessionEvents, SESSION_EXPIRED_REDIRECT};
pub use client::{AtelierLinkClient, AtelierLinkClientBuilder};
pub use connection::{MessageHandler, RealtimeConnection, SubscriptionId};
pub use dispatch::{ChatDispatcher, DispatchError, DispatchErrorKind, TreeDispatcher};
pub use error::{AtelierLinkError, Result};
pub use event_handlers::{
    ConnectionError, DisconnectReason, EventHandlers, TransportErrorKind,
};
pub use models::{
    ApiResponse, ChatMessage, ChatMessageType, ConnectParams, ConnectionStatus, FileNode,
    NodeKind, RefreshResponse, SubscriptionInfo, TalkPayload, TreeEvent, TreeMovePayload,
    TreeRemovePayload,
};
pub use sync::{ChatEntry, ChatEntryKind, ChatLog, FileTree};
pub use timeouts::AtelierLinkTimeouts;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
