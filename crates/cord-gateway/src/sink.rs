//! Event sinks
//!
//! The session publishes decoded dispatch events and terminal failures to an
//! [`EventSink`] injected at construction.

use crate::error::GatewayError;
use crate::events::DispatchEvent;
use serde_json::Value;
use tokio::sync::mpsc;

/// Receives what the session publishes
///
/// Callbacks run inline on the session task; keep them short.
pub trait EventSink: Send + Sync {
    /// A dispatch frame with a type tag arrived
    fn on_event(&self, event_type: &str, payload: Value);

    /// The session failed for good and will not reconnect
    fn on_fatal_error(&self, error: &GatewayError);
}

/// What a [`ChannelSink`] forwards
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Dispatch(DispatchEvent),
    Fatal(String),
}

/// Sink that forwards typed events over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event_type: &str, payload: Value) {
        let event = DispatchEvent::parse(event_type, payload);
        if self.tx.send(GatewayEvent::Dispatch(event)).is_err() {
            tracing::trace!(event_type = %event_type, "Event receiver dropped");
        }
    }

    fn on_fatal_error(&self, error: &GatewayError) {
        if self.tx.send(GatewayEvent::Fatal(error.to_string())).is_err() {
            tracing::trace!(error = %error, "Event receiver dropped");
        }
    }
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event_type: &str, payload: Value) {
        tracing::info!(event_type = %event_type, payload = %payload, "Dispatch");
    }

    fn on_fatal_error(&self, error: &GatewayError) {
        tracing::error!(error = %error, "Gateway session failed");
    }
}
