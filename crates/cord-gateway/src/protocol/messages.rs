//! Gateway message format
//!
//! Every frame, in both directions, is `{op, d, t, s}`.

use super::{HelloPayload, IdentifyPayload, OpCode, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Gateway message format
///
/// Outbound frames always carry all four keys; `t` and `s` are `null` unless
/// set. Inbound frames may omit any key but `op`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Option<Value>,

    /// Event type (Dispatch only)
    #[serde(default)]
    pub t: Option<String>,

    /// Sequence number (Dispatch only)
    #[serde(default)]
    pub s: Option<u64>,
}

impl GatewayMessage {
    /// Create a frame with the given op code and payload
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self {
            op,
            d: Some(d),
            t: None,
            s: None,
        }
    }

    /// Attach an event type
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.t = Some(event_type.into());
        self
    }

    /// Attach a sequence number
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.s = Some(sequence);
        self
    }

    // === Client Messages ===

    /// Create a Heartbeat message (op=1) carrying the last seen sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: Some(last_sequence.map_or(Value::Null, |s| Value::Number(s.into()))),
            t: None,
            s: None,
        }
    }

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::new(
            OpCode::Identify,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::new(
            OpCode::Resume,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    // === Parsing Server Messages ===

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Read the resumable flag of an Invalid Session message (op=9)
    ///
    /// A missing or non-boolean payload counts as not resumable.
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Read the sequence number sent with a Heartbeat message (op=1)
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_u64))
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn carries_credentials(&self) -> bool {
        matches!(self.op, OpCode::Identify | OpCode::Resume)
    }
}

impl fmt::Debug for GatewayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("GatewayMessage");
        debug.field("op", &self.op);
        if self.carries_credentials() {
            debug.field("d", &"<redacted>");
        } else {
            debug.field("d", &self.d);
        }
        debug.field("t", &self.t).field("s", &self.s).finish()
    }
}

impl fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
