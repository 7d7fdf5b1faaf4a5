//! # ripple-protocol
//!
//! Wire protocol definitions for the Ripple realtime messaging client.
//!
//! Every frame on the wire is a JSON envelope of the form
//! `{ "event": "...", "data": "...", "channel": "..." }` where `data` is
//! always carried as a string, even when it semantically holds JSON
//! (nested JSON is double-encoded by the service).
//!
//! This crate defines:
//!
//! - `Envelope` - the frame envelope, with inbound `data` normalization
//! - System event names under the reserved `ripple:` prefix
//! - `ChannelKind` - channel classification by name prefix
//! - Typed payloads for the system events
//!
//! ## Example
//!
//! ```rust
//! use ripple_protocol::{decode, events, ChannelKind};
//!
//! let env = decode(r#"{"event":"greeting","channel":"chat","data":"\"hi\""}"#).unwrap();
//! assert_eq!(env.event, "greeting");
//! assert!(!events::is_system_event(&env.event));
//! assert_eq!(ChannelKind::from_name("chat"), ChannelKind::Public);
//! ```

pub mod channels;
pub mod envelope;
pub mod system;
pub mod version;

pub use channels::ChannelKind;
pub use envelope::{decode, encode, events, Envelope, ProtocolError};
pub use system::{
    subscribe_frame, unsubscribe_frame, AuthTokens, ConnectionEstablished, EncryptedPayload,
    MemberAdded, MemberRemoved, PresenceBody, PresenceSnapshot, SubscribeRequest,
    SubscriptionCount, SystemError, UnsubscribeRequest,
};
pub use version::{connection_url, CLIENT_NAME, PROTOCOL_VERSION};
