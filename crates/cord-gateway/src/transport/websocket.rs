//! WebSocket transport over tokio-tungstenite

use super::{Connector, SocketEvent, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Default time allowed for the TCP + TLS + upgrade handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens WebSocket transports (`ws://` and `wss://`)
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Set the handshake timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            url: url.to_string(),
            reason,
        };

        let (stream, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| connect_error(format!("timed out after {:?}", self.connect_timeout)))?
                .map_err(|e| connect_error(e.to_string()))?;

        tracing::debug!(url = %url, "WebSocket connection established");

        Ok(Box::new(WebSocketTransport {
            stream,
            closed: None,
        }))
    }
}

/// A live WebSocket connection
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Set once the socket is closed, with the code that closed it
    closed: Option<Option<u16>>,
}

impl WebSocketTransport {
    fn mark_closed(&mut self, code: Option<u16>) -> SocketEvent {
        self.closed = Some(code);
        SocketEvent::Closed(code)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.is_some() {
            return Err(TransportError::Closed);
        }
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> SocketEvent {
        if let Some(code) = self.closed {
            return SocketEvent::Closed(code);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text),
                Some(Ok(Message::Binary(data))) => return SocketEvent::Binary(data),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    tracing::debug!(code = ?code, "Server closed WebSocket");
                    return self.mark_closed(code);
                }
                // Pongs are queued by tungstenite and flushed on the next read/write
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket read error");
                    return self.mark_closed(None);
                }
                None => return self.mark_closed(None),
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        if self.closed.is_some() {
            return Ok(());
        }
        self.closed = Some(Some(code));

        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: Cow::Borrowed(""),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
