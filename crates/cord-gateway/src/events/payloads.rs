//! Dispatch payloads the session itself depends on
//!
//! Application payloads (messages, guilds, ...) stay opaque JSON; only the
//! handshake results are typed.

use super::GatewayEventType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// READY event payload
///
/// Sent after a successful Identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL to use when resuming this session
    #[serde(default)]
    pub resume_gateway_url: Option<String>,

    /// Current user, left opaque
    #[serde(default)]
    pub user: Option<Value>,

    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// Unavailable guild in READY event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
    #[serde(default)]
    pub unavailable: bool,
}

/// A decoded dispatch, with typed variants for the events the session acts on
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Ready(ReadyEvent),
    Resumed,
    Other { event_type: String, data: Value },
}

impl DispatchEvent {
    /// Build a typed event from a dispatch type tag and payload
    ///
    /// A READY whose payload does not parse is passed through as `Other`.
    #[must_use]
    pub fn parse(event_type: &str, data: Value) -> Self {
        match GatewayEventType::from_str(event_type) {
            Some(GatewayEventType::Ready) => match serde_json::from_value(data.clone()) {
                Ok(ready) => Self::Ready(ready),
                Err(_) => Self::Other {
                    event_type: event_type.to_string(),
                    data,
                },
            },
            Some(GatewayEventType::Resumed) => Self::Resumed,
            _ => Self::Other {
                event_type: event_type.to_string(),
                data,
            },
        }
    }

    /// The dispatch type tag this event came from
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Ready(_) => GatewayEventType::Ready.as_str(),
            Self::Resumed => GatewayEventType::Resumed.as_str(),
            Self::Other { event_type, .. } => event_type,
        }
    }
}
