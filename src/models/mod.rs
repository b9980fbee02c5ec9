//! Wire and configuration models for the Atelier client.

mod api_response;
mod chat_message;
mod connect_params;
mod connection_status;
mod refresh_response;
mod subscription_info;
mod tree_event;

pub use api_response::ApiResponse;
pub use chat_message::{ChatMessage, ChatMessageType, TalkPayload};
pub use connect_params::ConnectParams;
pub use connection_status::ConnectionStatus;
pub use refresh_response::RefreshResponse;
pub use subscription_info::SubscriptionInfo;
pub use tree_event::{FileNode, NodeKind, TreeEvent, TreeMovePayload, TreeRemovePayload};

#[cfg(test)]
mod tests;
