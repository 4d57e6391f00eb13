//! Handshake payload definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Capability bitmask
    pub intents: u64,

    /// Ask the server to zlib-compress dispatch payloads
    pub compress: bool,

    /// Client identification properties
    pub properties: IdentifyProperties,
}

impl fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("compress", &self.compress)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Client connection properties
///
/// Serializes to `{}` when nothing is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Library or client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Device name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl IdentifyProperties {
    /// Create empty properties
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

/// Payload for op 6 (Resume)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

impl fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}
