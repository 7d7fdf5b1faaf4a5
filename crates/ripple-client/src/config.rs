//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::ChannelAuthorizer;
use crate::crypto::KEY_LENGTH;
use crate::error::ClientError;

/// Default timeout applied to suspend-capable client operations.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared-secret key used to decrypt payloads on encrypted channels.
///
/// The key itself is redacted from debug output.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LENGTH]);

impl MasterKey {
    /// Build a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build a key from a standard-base64 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid base64 or does not
    /// decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, ClientError> {
        let decoded = BASE64
            .decode(encoded)
            .map_err(|e| ClientError::InvalidArgument(format!("invalid master key: {e}")))?;
        let bytes: [u8; KEY_LENGTH] = decoded.try_into().map_err(|v: Vec<u8>| {
            ClientError::InvalidArgument(format!(
                "master key must be {KEY_LENGTH} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub(crate) fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Configuration for a [`crate::Ripple`] client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Application key identifying the app to the service.
    pub app_key: String,
    /// Service cluster, used to derive the host when no override is set.
    pub cluster: Option<String>,
    /// Host override. Takes precedence over `cluster`.
    pub host: Option<String>,
    /// Connect over TLS. On by default.
    pub use_tls: bool,
    /// Timeout for connect, subscribe, and authorization calls.
    pub client_timeout: Duration,
    /// Reconnect automatically after an unexpected drop. On by default.
    pub auto_reconnect: bool,
    /// Initial reconnect delay, doubled after each failed attempt.
    pub backoff_increment: Duration,
    /// Upper bound on the reconnect delay.
    pub backoff_ceiling: Duration,
    /// Authorizer consulted for private and presence channel subscriptions.
    pub authorizer: Option<Arc<dyn ChannelAuthorizer>>,
    /// Key for decrypting payloads on encrypted channels.
    pub master_encryption_key: Option<MasterKey>,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given app key.
    #[must_use]
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            cluster: None,
            host: None,
            use_tls: true,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            auto_reconnect: true,
            backoff_increment: ripple_transport::backoff::DEFAULT_INCREMENT,
            backoff_ceiling: ripple_transport::backoff::DEFAULT_CEILING,
            authorizer: None,
            master_encryption_key: None,
        }
    }

    /// Set the service cluster.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Override the service host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Set the client operation timeout.
    #[must_use]
    pub fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Set the reconnect backoff parameters.
    #[must_use]
    pub fn with_backoff(mut self, increment: Duration, ceiling: Duration) -> Self {
        self.backoff_increment = increment;
        self.backoff_ceiling = ceiling;
        self
    }

    /// Set the channel authorizer.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: impl ChannelAuthorizer + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Set the master key for encrypted channels.
    #[must_use]
    pub fn with_master_encryption_key(mut self, key: MasterKey) -> Self {
        self.master_encryption_key = Some(key);
        self
    }

    /// The WebSocket URL this configuration connects to.
    #[must_use]
    pub fn url(&self) -> String {
        let host = match (&self.host, &self.cluster) {
            (Some(host), _) => host.clone(),
            (None, Some(cluster)) => format!("ws-{cluster}.ripple.io"),
            (None, None) => "ws.ripple.io".to_string(),
        };
        ripple_protocol::connection_url(&host, &self.app_key, self.use_tls)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app_key", &self.app_key)
            .field("cluster", &self.cluster)
            .field("host", &self.host)
            .field("use_tls", &self.use_tls)
            .field("client_timeout", &self.client_timeout)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("has_authorizer", &self.authorizer.is_some())
            .field("has_master_key", &self.master_encryption_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_cluster() {
        let config = ClientConfig::new("key1").with_cluster("eu");
        assert!(config.url().starts_with("wss://ws-eu.ripple.io/app/key1"));
    }

    #[test]
    fn test_host_override_wins() {
        let config = ClientConfig::new("key1")
            .with_cluster("eu")
            .with_host("localhost:4040")
            .with_tls(false);
        assert!(config.url().starts_with("ws://localhost:4040/app/key1"));
    }

    #[test]
    fn test_master_key_from_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let key = MasterKey::from_base64(&encoded).unwrap();
        assert_eq!(key.bytes(), &[7u8; 32]);

        assert!(MasterKey::from_base64("dG9vLXNob3J0").is_err());
        assert!(MasterKey::from_base64("not base64!!").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = MasterKey::from_bytes([7u8; 32]);
        assert_eq!(format!("{key:?}"), "MasterKey(..)");
    }
}
