//! WebSocket transport implementation.
//!
//! This module provides the outbound WebSocket transport using
//! tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::traits::{Connector, SocketError, SocketSink, SocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new WebSocket connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SocketError> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| SocketError::Handshake(e.to_string()))?;

        debug!(status = %response.status(), "WebSocket handshake completed");

        let (sink, stream) = ws_stream.split();
        Ok((
            Box::new(WebSocketSink { sink, open: true }),
            Box::new(WebSocketReader { stream }),
        ))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Outbound half of a WebSocket connection.
struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
    open: bool,
}

#[async_trait]
impl SocketSink for WebSocketSink {
    async fn send(&mut self, text: String) -> Result<(), SocketError> {
        if !self.open {
            return Err(SocketError::Closed);
        }
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| SocketError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(SocketError::Send(e.to_string())),
        }
    }
}

/// Inbound half of a WebSocket connection.
struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl SocketStream for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    // The service speaks text JSON; tolerate UTF-8 binary frames.
                    match String::from_utf8(data) {
                        Ok(text) => return Ok(Some(text)),
                        Err(e) => return Err(SocketError::Receive(e.to_string())),
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // Protocol-level keepalives are handled by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Received close frame");
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    debug!("Connection closed");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive error");
                    return Err(SocketError::Receive(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}
