//! Session lifecycle states

use serde::Serialize;
use std::fmt;

/// Where a session is in its lifecycle
///
/// Exactly one state holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    /// No socket attached
    Disconnected,
    /// Resolving the endpoint and opening a socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify or Resume sent, waiting for READY/RESUMED
    Handshaking,
    /// READY or RESUMED received
    Established,
    /// Unrecoverable; no further reconnects
    Failed,
}

impl SessionState {
    /// Check if the session will never act again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if a socket is attached in this state
    #[must_use]
    pub const fn has_socket(self) -> bool {
        matches!(self, Self::AwaitingHello | Self::Handshaking | Self::Established)
    }

    /// Get the name of this state
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Handshaking => "Handshaking",
            Self::Established => "Established",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
