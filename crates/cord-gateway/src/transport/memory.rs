//! In-memory transport
//!
//! Lets tests (or an embedding application) play the gateway side of a
//! session without a network. Every `open` call hands a [`MemoryPeer`] to the
//! [`MemoryListener`].

use super::{Connector, SocketEvent, Transport};
use crate::error::TransportError;
use crate::protocol::GatewayMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A frame the client wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Close(u16),
}

impl ClientFrame {
    /// Parse a text frame as a gateway message
    #[must_use]
    pub fn message(&self) -> Option<GatewayMessage> {
        match self {
            Self::Text(text) => GatewayMessage::from_json(text).ok(),
            Self::Close(_) => None,
        }
    }
}

/// Connector that hands out in-memory sockets
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    opened: Arc<AtomicUsize>,
    refuse: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Create a connector and the listener that receives its peers
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let opened = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicUsize::new(0));

        let connector = Self {
            peers: tx,
            opened: opened.clone(),
            refuse: refuse.clone(),
        };
        let listener = MemoryListener {
            peers: rx,
            opened,
            refuse,
        };
        (connector, listener)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.peers.send(peer).map_err(|_| TransportError::Connect {
            url: url.to_string(),
            reason: "listener dropped".to_string(),
        })?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryTransport {
            inbound,
            outbound,
            closed: None,
        }))
    }
}

/// Receives the server side of every socket the connector opens
#[derive(Debug)]
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    opened: Arc<AtomicUsize>,
    refuse: Arc<AtomicUsize>,
}

impl MemoryListener {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Take a connection if one was opened already
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }

    /// Number of sockets opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Make the next `count` open attempts fail
    pub fn refuse_next(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }
}

/// Server side of one in-memory socket
#[derive(Debug)]
pub struct MemoryPeer {
    /// URL the client connected to
    pub url: String,
    to_client: mpsc::UnboundedSender<SocketEvent>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl MemoryPeer {
    /// Deliver a gateway message as a text frame
    pub fn send(&self, message: &GatewayMessage) {
        if let Ok(json) = message.to_json() {
            self.send_text(json);
        }
    }

    /// Deliver a raw text frame
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(SocketEvent::Text(text.into()));
    }

    /// Deliver a raw binary frame
    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.to_client.send(SocketEvent::Binary(data));
    }

    /// Close the socket from the server side
    pub fn close(&self, code: Option<u16>) {
        let _ = self.to_client.send(SocketEvent::Closed(code));
    }

    /// Wait for the next frame the client wrote
    ///
    /// Returns `None` once the client has dropped the socket.
    pub async fn next_frame(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Take a client frame if one is already queued
    pub fn try_next_frame(&mut self) -> Option<ClientFrame> {
        self.from_client.try_recv().ok()
    }

    /// Wait for the next client message, skipping heartbeats
    pub async fn next_message(&mut self) -> Option<GatewayMessage> {
        while let Some(frame) = self.next_frame().await {
            match frame.message() {
                Some(msg) if msg.op == crate::protocol::OpCode::Heartbeat => {}
                Some(msg) => return Some(msg),
                None => return None,
            }
        }
        None
    }
}

/// Client side of one in-memory socket
struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<SocketEvent>,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    closed: Option<Option<u16>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.is_some() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(ClientFrame::Text(text))
            .map_err(|_| TransportError::Send("peer dropped".to_string()))
    }

    async fn recv(&mut self) -> SocketEvent {
        if let Some(code) = self.closed {
            return SocketEvent::Closed(code);
        }

        // A dropped peer looks like an abnormal closure without a code
        let event = self.inbound.recv().await.unwrap_or(SocketEvent::Closed(None));
        if let SocketEvent::Closed(code) = event {
            self.closed = Some(code);
        }
        event
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        if self.closed.is_some() {
            return Ok(());
        }
        self.closed = Some(Some(code));
        let _ = self.outbound.send(ClientFrame::Close(code));
        Ok(())
    }
}
