//! The frame envelope for the Ripple protocol.
//!
//! Every inbound and outbound frame is a JSON object with an `event` name,
//! an optional `channel`, and a `data` payload that is always a string on
//! the wire. Some system error frames arrive with `data` as a nested JSON
//! object instead; those are re-serialized to a string during decoding so
//! that dispatch only ever sees string payloads.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// System event names and prefixes.
pub mod events {
    /// Prefix reserved for events originated by the service.
    pub const SYSTEM_PREFIX: &str = "ripple:";

    /// Prefix required on client-originated channel events.
    pub const CLIENT_PREFIX: &str = "client-";

    /// Sent by the service once the socket is accepted; carries the socket id.
    pub const CONNECTION_ESTABLISHED: &str = "ripple:connection_established";
    /// Generic error frame carrying `{message, code}`.
    pub const ERROR: &str = "ripple:error";
    /// Subscribe request produced by the client.
    pub const SUBSCRIBE: &str = "ripple:subscribe";
    /// Unsubscribe request produced by the client.
    pub const UNSUBSCRIBE: &str = "ripple:unsubscribe";
    /// Service acknowledgment of a subscription.
    pub const SUBSCRIPTION_SUCCEEDED: &str = "ripple:subscription_succeeded";
    /// Service rejection of a subscription.
    pub const SUBSCRIPTION_ERROR: &str = "ripple:subscription_error";
    /// Presence channel member joined.
    pub const MEMBER_ADDED: &str = "ripple:member_added";
    /// Presence channel member left.
    pub const MEMBER_REMOVED: &str = "ripple:member_removed";
    /// Subscriber count update for a channel.
    pub const SUBSCRIPTION_COUNT: &str = "ripple:subscription_count";

    /// Check whether an event name belongs to the service.
    #[must_use]
    pub fn is_system_event(name: &str) -> bool {
        name.starts_with(SYSTEM_PREFIX)
    }

    /// Check whether an event name is a valid client-originated event.
    #[must_use]
    pub fn is_client_event(name: &str) -> bool {
        name.starts_with(CLIENT_PREFIX)
    }
}

/// Protocol errors that can occur during envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or did not match the envelope shape.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A system payload did not match its expected shape.
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload {
        /// Event name the payload belonged to.
        event: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Encoding a frame failed.
    #[error("encoding error: {0}")]
    Encode(String),
}

/// A single protocol frame.
///
/// Envelopes are created per inbound frame and never mutated. The `data`
/// field is normalized on deserialization: if the service sent a nested
/// JSON value instead of a string, it is re-serialized to a string first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name.
    pub event: String,

    /// Payload, always carried as a string.
    #[serde(default, deserialize_with = "deserialize_data")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Channel the event was delivered on, absent for connection-level frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Originating user id, present on presence-channel client events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Envelope {
    /// Create an envelope for a channel event.
    #[must_use]
    pub fn channel_event(
        event: impl Into<String>,
        channel: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            data: Some(data.into()),
            channel: Some(channel.into()),
            user_id: None,
        }
    }

    /// Create an envelope for a connection-level event.
    #[must_use]
    pub fn system_event(event: impl Into<String>, data: Option<String>) -> Self {
        Self {
            event: event.into(),
            data,
            channel: None,
            user_id: None,
        }
    }

    /// Parse the `data` payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is absent or does not match `T`.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let data = self.data.as_deref().unwrap_or_default();
        serde_json::from_str(data).map_err(|e| ProtocolError::InvalidPayload {
            event: self.event.clone(),
            reason: e.to_string(),
        })
    }
}

/// Normalize the wire `data` field to a string.
///
/// The service double-encodes nested JSON, but some system error frames
/// carry a bare JSON object. Both forms decode to the same `Option<String>`.
fn deserialize_data<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Decode an envelope from a text frame.
///
/// # Errors
///
/// Returns an error if the frame is not a valid envelope.
pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidFrame(e.to_string()))
}

/// Encode an envelope to a text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_string_data() {
        let env = decode(r#"{"event":"greeting","channel":"chat","data":"{\"msg\":\"hi\"}"}"#)
            .unwrap();
        assert_eq!(env.event, "greeting");
        assert_eq!(env.channel.as_deref(), Some("chat"));
        assert_eq!(env.data.as_deref(), Some(r#"{"msg":"hi"}"#));
    }

    #[test]
    fn test_decode_normalizes_nested_json_data() {
        // Some system error frames carry data as a bare object.
        let env = decode(r#"{"event":"ripple:error","data":{"message":"over quota","code":4100}}"#)
            .unwrap();
        let data = env.data.unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["code"], 4100);
    }

    #[test]
    fn test_decode_missing_data() {
        let env = decode(r#"{"event":"ripple:ping"}"#).unwrap();
        assert!(env.data.is_none());
        assert!(env.channel.is_none());
    }

    #[test]
    fn test_decode_rejects_non_envelope() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"channel":"chat"}"#).is_err());
    }

    #[test]
    fn test_encode_roundtrip() {
        let env = Envelope::channel_event("client-typing", "private-chat", "{}");
        let text = encode(&env).unwrap();
        assert_eq!(decode(&text).unwrap(), env);
    }

    #[test]
    fn test_event_name_classification() {
        assert!(events::is_system_event("ripple:error"));
        assert!(!events::is_system_event("client-typing"));
        assert!(events::is_client_event("client-typing"));
        assert!(!events::is_client_event("typing"));
    }

    #[test]
    fn test_parse_data_typed() {
        #[derive(serde::Deserialize)]
        struct Greeting {
            msg: String,
        }
        let env = Envelope::channel_event("greeting", "chat", r#"{"msg":"hi"}"#);
        let parsed: Greeting = env.parse_data().unwrap();
        assert_eq!(parsed.msg, "hi");
    }
}
