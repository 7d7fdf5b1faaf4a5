//! # ripple-transport
//!
//! Transport boundary for the Ripple realtime client.
//!
//! The client core only needs five operations from a transport: open a
//! socket to a URL, send a text frame, receive text frames, observe
//! closure, and close. This crate defines those as object-safe traits and
//! provides the tokio-tungstenite WebSocket implementation.
//!
//! The socket is split into sink and stream halves at open time so that a
//! dedicated reader task can own the stream while senders share the sink.
//!
//! ```rust,ignore
//! use ripple_transport::{Connector, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new();
//! let (mut sink, mut stream) = connector.open("wss://example.test/app/key").await?;
//! sink.send(r#"{"event":"ripple:ping"}"#.to_string()).await?;
//! while let Some(frame) = stream.recv().await? {
//!     // Process frame
//! }
//! ```

pub mod backoff;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use backoff::Backoff;
pub use traits::{Connector, SocketError, SocketSink, SocketStream};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
