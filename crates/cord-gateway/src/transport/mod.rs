//! Transport sockets
//!
//! A session talks to the gateway through a [`Transport`]: a full-duplex frame
//! channel it owns exclusively. A [`Connector`] opens a fresh transport for
//! every (re)connect.

pub mod memory;
mod websocket;

pub use memory::{ClientFrame, MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::{WebSocketConnector, WebSocketTransport};

use crate::error::TransportError;
use async_trait::async_trait;

/// Something that happened on a socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A text frame
    Text(String),
    /// A binary (compressed) frame
    Binary(Vec<u8>),
    /// The socket closed, with the close code if the peer sent one
    Closed(Option<u16>),
}

/// A full-duplex gateway socket
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next frame or closure
    ///
    /// Must be cancel-safe: the session polls it inside `tokio::select!`.
    /// Once `Closed` has been returned, every further call returns it again.
    async fn recv(&mut self) -> SocketEvent;

    /// Close the socket with the given code
    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}
