//! # ripple-client
//!
//! Client for a Ripple realtime pub/sub service.
//!
//! A [`Ripple`] client holds one WebSocket connection and any number of
//! channel subscriptions on it. Channels come in four kinds, derived
//! from the name prefix: public, `private-`, `presence-`, and
//! `private-encrypted-`. Private and presence channels require a
//! [`ChannelAuthorizer`]; encrypted channels additionally require a
//! [`MasterKey`] for payload decryption.
//!
//! The connection reconnects automatically with exponential backoff and
//! replays every subscription, with fresh authorization, when it comes
//! back. Faults that have no awaiting caller are delivered on the
//! shared error channel, see [`Ripple::on_error`].
//!
//! ```rust,ignore
//! use ripple_client::{ClientConfig, HttpAuthorizer, Ripple};
//!
//! let config = ClientConfig::new("app-key")
//!     .with_cluster("eu")
//!     .with_authorizer(HttpAuthorizer::new("https://example.test/ripple/auth"));
//! let client = Ripple::new(config)?;
//!
//! client.connect().await?;
//! let channel = client.subscribe("presence-lobby").await?;
//! channel.bind("message", |envelope| {
//!     println!("{:?}", envelope.data);
//! })?;
//! channel.trigger("client-typing", &serde_json::json!({"user": "ada"}))?;
//! ```

pub mod auth;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod emitter;
pub mod error;
pub mod presence;

mod backlog;
mod client;
mod connection;
mod registry;

pub use auth::{AuthError, ChannelAuthorizer, HttpAuthorizer};
pub use channel::Channel;
pub use client::Ripple;
pub use config::{ClientConfig, MasterKey};
pub use connection::{ConnectionState, StateChange, StateListener};
pub use crypto::DecryptionError;
pub use emitter::{EventEmitter, Listener};
pub use error::{ClientError, ErrorListener, ErrorReporter};
pub use presence::{Member, MemberRoster};

pub use ripple_protocol::{AuthTokens, ChannelKind, Envelope};
