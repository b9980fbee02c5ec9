//! Authenticated HTTP API client with coordinated token refresh.
//!
//! Every Atelier REST endpoint wraps its result in the
//! `{success, data, error}` envelope ([`ApiResponse`]). This client owns
//! the cross-cutting 401 recovery:
//!
//! 1. a 401 triggers a token refresh, but **concurrent 401s share one
//!    in-flight refresh**; the refresh endpoint is called exactly once
//!    no matter how many requests fail at the same time;
//! 2. on success the original request is retried once with the new
//!    token; a failing retry propagates to the caller;
//! 3. on refresh failure every waiter gets [`AtelierLinkError::SessionExpired`]
//!    and [`SessionEvents::on_session_expired`] fires with the sign-out
//!    redirect path;
//! 4. the in-flight slot is cleared when the refresh settles (success or
//!    failure), so a failed refresh can never wedge later requests.

use crate::error::{AtelierLinkError, Result};
use crate::models::{ApiResponse, RefreshResponse};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Where the embedding UI must navigate when the session cannot be
/// recovered.
pub const SESSION_EXPIRED_REDIRECT: &str = "/signin?error=SessionExpired";

/// Path of the token refresh endpoint, relative to the base URL.
const REFRESH_PATH: &str = "/api/auth/refresh";

type SharedRefresh =
    Shared<BoxFuture<'static, std::result::Result<String, Arc<AtelierLinkError>>>>;

/// Type alias for the on_token_refresh callback.
pub type OnTokenRefreshCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Type alias for the on_session_expired callback.
pub type OnSessionExpiredCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Session lifecycle callbacks for the HTTP client.
///
/// `on_token_refresh` broadcasts a newly obtained access token to
/// session-state consumers (e.g. to hand it to the realtime connection on
/// the next reconnect). `on_session_expired` receives the sign-out
/// redirect path when a refresh fails.
#[derive(Clone, Default)]
pub struct SessionEvents {
    on_token_refresh: Option<OnTokenRefreshCallback>,
    on_session_expired: Option<OnSessionExpiredCallback>,
}

impl fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvents")
            .field("on_token_refresh", &self.on_token_refresh.is_some())
            .field("on_session_expired", &self.on_session_expired.is_some())
            .finish()
    }
}

impl SessionEvents {
    /// Create a new empty `SessionEvents` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked with every refreshed access token.
    pub fn on_token_refresh(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_token_refresh = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked with the sign-out redirect path when
    /// the session cannot be recovered.
    pub fn on_session_expired(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_token_refresh(&self, token: &str) {
        if let Some(cb) = &self.on_token_refresh {
            cb(token);
        }
    }

    pub(crate) fn emit_session_expired(&self, redirect: &str) {
        if let Some(cb) = &self.on_session_expired {
            cb(redirect);
        }
    }
}

/// Authenticated REST client for the Atelier API.
///
/// Cheap to clone; clones share the token cell and the refresh slot, so
/// every call site participates in the same single-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    refresh_slot: Arc<Mutex<Option<SharedRefresh>>>,
    session: SessionEvents,
}

impl ApiClient {
    pub(crate) fn new(
        base_url: String,
        http: reqwest::Client,
        token: Option<String>,
        session: SessionEvents,
    ) -> Self {
        Self {
            base_url,
            http,
            token: Arc::new(RwLock::new(token)),
            refresh_slot: Arc::new(Mutex::new(None)),
            session,
        }
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    /// Replace the access token (e.g. after an external sign-in).
    pub fn set_access_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    /// GET a path, returning the decoded envelope.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request_json(Method::GET, path, None).await
    }

    /// POST a JSON body to a path, returning the decoded envelope.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        let body = serde_json::to_value(body)?;
        self.request_json(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body to a path, returning the decoded envelope.
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        let body = serde_json::to_value(body)?;
        self.request_json(Method::PUT, path, Some(body)).await
    }

    /// DELETE a path, returning the decoded envelope.
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request_json(Method::DELETE, path, None).await
    }

    /// Send an authenticated request with 401 refresh-and-retry.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse<T>> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("[API] {} {}", method, url);

        let response = self.send_authed(method.clone(), &url, body.as_ref()).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            log::debug!("[API] 401 from {}; entering refresh flow", url);
            self.refresh_access_token().await?;
            // Exactly one retry with the refreshed token; the refresh is
            // guaranteed to have completed before this fires.
            let retry = self.send_authed(method, &url, body.as_ref()).await?;
            return Self::parse_response(retry).await;
        }
        Self::parse_response(response).await
    }

    async fn send_authed(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.http.request(method, url);
        if let Some(token) = self.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(Into::into)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>> {
        let status = response.status();
        if status.is_success() {
            return response.json::<ApiResponse<T>>().await.map_err(|e| {
                AtelierLinkError::SerializationError(format!(
                    "Failed to decode API envelope: {}",
                    e
                ))
            });
        }

        // Prefer the server-supplied message when the body carries the
        // standard envelope.
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<Value>>(&text)
            .ok()
            .and_then(|envelope| envelope.error)
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    text.clone()
                }
            });
        Err(AtelierLinkError::ServerError {
            status_code: status.as_u16(),
            message,
        })
    }

    /// Refresh the access token, sharing one in-flight refresh across
    /// all concurrent callers.
    ///
    /// Returns the new token. Awaiting callers all observe the result of
    /// the same network call.
    pub async fn refresh_access_token(&self) -> Result<String> {
        let fut = {
            let mut slot = self.refresh_slot.lock().await;
            match slot.as_ref() {
                Some(inflight) => {
                    log::debug!("[API] Refresh already in flight; awaiting shared result");
                    inflight.clone()
                },
                None => {
                    let fut = Self::run_refresh(self.clone()).boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                },
            }
        };
        fut.await.map_err(|e| (*e).clone())
    }

    /// The single refresh execution. Clears the slot when it settles
    /// (success or failure), so later 401s start a fresh refresh instead
    /// of awaiting a stale result.
    async fn run_refresh(client: ApiClient) -> std::result::Result<String, Arc<AtelierLinkError>> {
        let result = client.perform_refresh().await;

        let out = match result {
            Ok(token) => {
                log::debug!("[API] Token refresh succeeded");
                client.set_access_token(token.clone());
                client.session.emit_token_refresh(&token);
                Ok(token)
            },
            Err(e) => {
                log::warn!("[API] Token refresh failed: {}; forcing sign-out", e);
                client.session.emit_session_expired(SESSION_EXPIRED_REDIRECT);
                Err(Arc::new(AtelierLinkError::SessionExpired))
            },
        };

        let mut slot = client.refresh_slot.lock().await;
        *slot = None;
        out
    }

    async fn perform_refresh(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        log::debug!("[API] POST {}", url);
        let response = self.http.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AtelierLinkError::AuthenticationError(format!(
                "Token refresh failed with HTTP {}",
                status.as_u16()
            )));
        }
        let body: RefreshResponse = response.json().await.map_err(|e| {
            AtelierLinkError::SerializationError(format!(
                "Failed to decode refresh response: {}",
                e
            ))
        })?;
        Ok(body.access_token)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.access_token().is_some())
            .finish()
    }
}
