//! Main Atelier client with builder pattern.
//!
//! Bundles the authenticated HTTP client and the realtime connection,
//! plus the project-scoped destination helpers for chat and file-tree
//! topics.

use crate::api::{ApiClient, SessionEvents};
use crate::connection::{RealtimeConnection, SubscriptionId};
use crate::dispatch::{ChatDispatcher, TreeDispatcher};
use crate::error::{AtelierLinkError, Result};
use crate::event_handlers::EventHandlers;
use crate::models::{ConnectParams, ConnectionStatus, TalkPayload};
use crate::timeouts::AtelierLinkTimeouts;
use reqwest::Url;
use std::sync::Arc;

/// Main Atelier client.
///
/// Use [`AtelierLinkClientBuilder`] to construct instances. Must be built
/// inside a tokio runtime; the realtime connection task is spawned at
/// build time (socketless until [`connect_realtime`](Self::connect_realtime)).
///
/// # Examples
///
/// ```rust,no_run
/// use atelier_link::AtelierLinkClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AtelierLinkClient::builder()
///     .base_url("https://atelier.example")
///     .access_token("eyJhbGc...")
///     .build()?;
///
/// client.connect_realtime().await?;
/// client
///     .subscribe_chat(42, atelier_link::ChatDispatcher::new(|msg| {
///         println!("[{}] {}", msg.username, msg.content);
///     }))
///     .await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AtelierLinkClient {
    base_url: String,
    api: ApiClient,
    realtime: Arc<RealtimeConnection>,
}

impl AtelierLinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> AtelierLinkClientBuilder {
        AtelierLinkClientBuilder::new()
    }

    /// The authenticated HTTP API client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The realtime connection manager.
    pub fn realtime(&self) -> &RealtimeConnection {
        &self.realtime
    }

    /// The WebSocket endpoint derived from the base URL
    /// (`http → ws`, `https → wss`, path `/ws`).
    pub fn websocket_url(&self) -> Result<String> {
        resolve_ws_url(&self.base_url)
    }

    /// Connect the realtime channel using the current access token.
    ///
    /// Returns the status observed right after the connect call is
    /// processed; establishment is event-driven (watch `on_connect` /
    /// the status stream).
    pub async fn connect_realtime(&self) -> Result<ConnectionStatus> {
        let token = self.api.access_token().ok_or_else(|| {
            AtelierLinkError::AuthenticationError(
                "connect_realtime requires an access token".to_string(),
            )
        })?;
        let url = self.websocket_url()?;
        Ok(self.realtime.connect(ConnectParams::new(url, token)).await)
    }

    /// Chat topic for a project.
    pub fn chat_topic(project_id: u64) -> String {
        format!("/topic/projects/{}/chat", project_id)
    }

    /// File-tree topic for a project.
    pub fn tree_topic(project_id: u64) -> String {
        format!("/topic/projects/{}/tree", project_id)
    }

    /// Subscribe to a project's chat topic through a [`ChatDispatcher`].
    pub async fn subscribe_chat(
        &self,
        project_id: u64,
        dispatcher: ChatDispatcher,
    ) -> Option<SubscriptionId> {
        self.realtime
            .subscribe(&Self::chat_topic(project_id), move |raw| {
                dispatcher.dispatch(raw)
            })
            .await
    }

    /// Subscribe to a project's file-tree topic through a [`TreeDispatcher`].
    pub async fn subscribe_tree(
        &self,
        project_id: u64,
        dispatcher: TreeDispatcher,
    ) -> Option<SubscriptionId> {
        self.realtime
            .subscribe(&Self::tree_topic(project_id), move |raw| {
                dispatcher.dispatch(raw)
            })
            .await
    }

    /// Publish a chat message to a project (fire-and-forget).
    pub async fn publish_chat(&self, project_id: u64, content: &str) {
        let payload = TalkPayload {
            content: content.to_string(),
        };
        match serde_json::to_string(&payload) {
            Ok(body) => {
                self.realtime
                    .publish(&format!("/app/projects/{}/chat/talk", project_id), body)
                    .await;
            },
            Err(e) => log::warn!("Failed to serialize chat payload: {}", e),
        }
    }

    /// Ask the server to send the initial `tree:init` snapshot for a
    /// project (fire-and-forget).
    pub async fn request_tree_init(&self, project_id: u64) {
        self.realtime
            .publish(&format!("/app/projects/{}/tree/init", project_id), "")
            .await;
    }
}

/// Map the HTTP base URL onto the realtime endpoint.
fn resolve_ws_url(base_url: &str) -> Result<String> {
    let mut url = Url::parse(base_url.trim()).map_err(|e| {
        AtelierLinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AtelierLinkError::ConfigurationError(format!(
                "Unsupported base_url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };
    url.set_scheme(scheme).map_err(|_| {
        AtelierLinkError::ConfigurationError("Failed to set WebSocket URL scheme".to_string())
    })?;
    url.set_path("/ws");
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

/// Builder for configuring [`AtelierLinkClient`] instances.
pub struct AtelierLinkClientBuilder {
    base_url: Option<String>,
    access_token: Option<String>,
    timeouts: AtelierLinkTimeouts,
    event_handlers: EventHandlers,
    session_events: SessionEvents,
}

impl AtelierLinkClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeouts: AtelierLinkTimeouts::default(),
            event_handlers: EventHandlers::new(),
            session_events: SessionEvents::new(),
        }
    }

    /// Set the base URL of the Atelier server (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the initial access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the timeout and heartbeat configuration.
    pub fn timeouts(mut self, timeouts: AtelierLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the realtime lifecycle event handlers.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Set the session lifecycle callbacks (token refresh / sign-out).
    pub fn session_events(mut self, events: SessionEvents) -> Self {
        self.session_events = events;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AtelierLinkClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| AtelierLinkError::ConfigurationError("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        // Validate early so a bad URL fails at build time, not first call.
        Url::parse(&base_url).map_err(|e| {
            AtelierLinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
        })?;

        // Keep-alive pooling: idle connections are kept slightly longer
        // than the server's 75s keep-alive window.
        let http = reqwest::Client::builder()
            .timeout(self.timeouts.request_timeout)
            .connect_timeout(self.timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| AtelierLinkError::ConfigurationError(e.to_string()))?;

        let api = ApiClient::new(
            base_url.clone(),
            http,
            self.access_token,
            self.session_events,
        );
        let realtime = Arc::new(RealtimeConnection::new(
            self.timeouts,
            self.event_handlers,
        ));

        Ok(AtelierLinkClient {
            base_url,
            api,
            realtime,
        })
    }
}
