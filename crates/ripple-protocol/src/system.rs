//! Typed payloads for system events.
//!
//! These are the structures carried (double-encoded) in the `data` field
//! of system envelopes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::envelope::{events, Envelope, ProtocolError};

/// Payload of `ripple:connection_established`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    /// Socket id assigned to this connection, quoted to authorizers.
    pub socket_id: String,
    /// Seconds of inactivity after which the service may ping, informational.
    #[serde(default)]
    pub activity_timeout: Option<u32>,
}

/// Payload of the generic `ripple:error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemError {
    /// Human-readable error message.
    pub message: String,
    /// Service error code, absent on some transport-level errors.
    #[serde(default)]
    pub code: Option<u16>,
}

/// Payload of the outbound `ripple:subscribe` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Channel to subscribe to.
    pub channel: String,
    /// Authorization token, required for private/presence channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Presence member payload returned by the authorizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

/// Payload of the outbound `ripple:unsubscribe` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// Channel to unsubscribe from.
    pub channel: String,
}

/// Tokens returned by a channel authorizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// The signed authorization token.
    pub auth: String,
    /// Presence member payload, present for presence channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

/// Initial membership snapshot delivered with a presence subscription ack.
///
/// Wire shape: `{"presence":{"ids":[...],"hash":{id:info},"count":N}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// The membership body.
    pub presence: PresenceBody,
}

/// Body of a presence snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceBody {
    /// Member user ids in service order.
    pub ids: Vec<String>,
    /// Per-id member info.
    #[serde(default)]
    pub hash: HashMap<String, serde_json::Value>,
    /// Member count.
    #[serde(default)]
    pub count: usize,
}

/// Payload of `ripple:member_added`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAdded {
    /// The joining member's user id.
    pub user_id: String,
    /// The joining member's info payload.
    #[serde(default)]
    pub user_info: Option<serde_json::Value>,
}

/// Payload of `ripple:member_removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRemoved {
    /// The leaving member's user id.
    pub user_id: String,
}

/// Payload of `ripple:subscription_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCount {
    /// Current number of subscribers on the channel.
    pub subscription_count: u64,
}

/// Nonce + ciphertext pair carried on encrypted channels.
///
/// Both fields are base64-encoded on the wire. The pair is consumed once
/// by the decrypter and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Base64-encoded nonce.
    pub nonce: String,
    /// Base64-encoded ciphertext (including the authentication tag).
    pub ciphertext: String,
}

/// Build a subscribe envelope for a channel.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn subscribe_frame(request: &SubscribeRequest) -> Result<Envelope, ProtocolError> {
    let data = serde_json::to_string(request).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(Envelope::system_event(events::SUBSCRIBE, Some(data)))
}

/// Build an unsubscribe envelope for a channel.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn unsubscribe_frame(channel: &str) -> Result<Envelope, ProtocolError> {
    let request = UnsubscribeRequest {
        channel: channel.to_string(),
    };
    let data = serde_json::to_string(&request).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(Envelope::system_event(events::UNSUBSCRIBE, Some(data)))
}
