//! Transport abstraction traits for the Ripple client.
//!
//! These traits define the interface the client core requires from a
//! transport, allowing the core to be exercised against in-memory fakes
//! in tests.

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The socket is closed.
    #[error("socket closed")]
    Closed,

    /// Opening the socket or completing the handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Failed to send a frame.
    #[error("send failed: {0}")]
    Send(String),

    /// Failed to receive a frame.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The operation timed out.
    #[error("socket operation timed out")]
    Timeout,

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A transport that can dial out to a service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to the given URL.
    ///
    /// Returns the sink and stream halves of the socket. The stream half is
    /// intended to be owned by a single reader task; the sink half may be
    /// shared behind a lock or driven by a writer task.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SocketError>;

    /// Get the transport name (e.g., "websocket").
    fn name(&self) -> &'static str;
}

/// The outbound half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<(), SocketError>;

    /// Close the socket gracefully. Idempotent.
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// The inbound half of an open socket.
#[async_trait]
pub trait SocketStream: Send {
    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` when the socket is closed cleanly; transport
    /// faults are returned as errors and also terminate the stream.
    async fn recv(&mut self) -> Result<Option<String>, SocketError>;
}
