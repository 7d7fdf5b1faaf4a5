//! Channel authorization.
//!
//! Private, presence, and encrypted channels require a signed token from
//! an authorization endpoint run by the host application. The client
//! exchanges `(channel_name, socket_id)` for that token via the
//! `ChannelAuthorizer` contract; `HttpAuthorizer` is the standard HTTP
//! adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use ripple_protocol::AuthTokens;

/// Authorization failures, distinguished by cause.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The endpoint refused access outright (HTTP 403).
    #[error("the authorizer refused access")]
    Unauthorized,

    /// Any other non-success outcome, including connect errors and
    /// timeouts.
    #[error("authorization failed: {0}")]
    Failure(String),
}

/// Exchanges a socket id and channel name for a signed authorization
/// token.
///
/// Implementations may be slow (an HTTP round trip); the client never
/// calls them while holding its internal locks, so one channel's
/// authorization does not block unrelated operations.
#[async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    /// Authorize a subscription to `channel` for the connection identified
    /// by `socket_id`.
    async fn authorize(&self, channel: &str, socket_id: &str) -> Result<AuthTokens, AuthError>;
}

/// Closure adapter, mainly useful in tests.
#[async_trait]
impl<F> ChannelAuthorizer for F
where
    F: Fn(&str, &str) -> Result<AuthTokens, AuthError> + Send + Sync,
{
    async fn authorize(&self, channel: &str, socket_id: &str) -> Result<AuthTokens, AuthError> {
        self(channel, socket_id)
    }
}

/// HTTP adapter for a host-application authorization endpoint.
///
/// POSTs form fields `channel_name` and `socket_id` to the configured
/// URL and expects a JSON response body with an `auth` field and, for
/// presence channels, `channel_data`.
pub struct HttpAuthorizer {
    endpoint: String,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl HttpAuthorizer {
    /// Create an authorizer posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Attach a header (e.g. a bearer token) to every authorization
    /// request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl ChannelAuthorizer for HttpAuthorizer {
    async fn authorize(&self, channel: &str, socket_id: &str) -> Result<AuthTokens, AuthError> {
        debug!(channel = %channel, socket_id = %socket_id, "Requesting channel authorization");

        let mut request = self
            .client
            .post(&self.endpoint)
            .form(&[("channel_name", channel), ("socket_id", socket_id)]);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Failure(e.to_string()))?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(AuthError::Unauthorized),
            status if !status.is_success() => Err(AuthError::Failure(format!(
                "authorization endpoint returned {status}"
            ))),
            _ => response
                .json::<AuthTokens>()
                .await
                .map_err(|e| AuthError::Failure(format!("invalid authorization response: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(channel: &str, socket_id: &str) -> Result<AuthTokens, AuthError> {
        Ok(AuthTokens {
            auth: format!("key:{channel}:{socket_id}"),
            channel_data: None,
        })
    }

    fn refuse(_channel: &str, _socket_id: &str) -> Result<AuthTokens, AuthError> {
        Err(AuthError::Unauthorized)
    }

    #[tokio::test]
    async fn test_closure_authorizer() {
        let tokens = sign.authorize("private-chat", "81.5593").await.unwrap();
        assert_eq!(tokens.auth, "key:private-chat:81.5593");
    }

    #[tokio::test]
    async fn test_closure_authorizer_refusal() {
        let result = refuse.authorize("private-chat", "81.5593").await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }

    #[test]
    fn test_http_authorizer_builder() {
        let authorizer = HttpAuthorizer::new("http://localhost:3000/auth")
            .with_header("Authorization", "Bearer token");
        assert_eq!(authorizer.endpoint, "http://localhost:3000/auth");
        assert_eq!(authorizer.headers.len(), 1);
    }
}
