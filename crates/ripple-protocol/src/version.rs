//! Protocol versioning and connection URL parameters.

/// Current protocol version, sent as the `protocol` query parameter.
pub const PROTOCOL_VERSION: u8 = 7;

/// Client library identifier, sent as the `client` query parameter.
pub const CLIENT_NAME: &str = "ripple-rust";

/// Library version, sent as the `version` query parameter.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the WebSocket connection URL for an application key.
///
/// The URL is parameterized by protocol version and client name/version so
/// the service can reject incompatible clients during the handshake.
#[must_use]
pub fn connection_url(host: &str, app_key: &str, use_tls: bool) -> String {
    let scheme = if use_tls { "wss" } else { "ws" };
    format!(
        "{scheme}://{host}/app/{app_key}?protocol={PROTOCOL_VERSION}&client={CLIENT_NAME}&version={CLIENT_VERSION}"
    )
}
