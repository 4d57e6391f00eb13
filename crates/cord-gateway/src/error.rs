//! Gateway error types

use crate::protocol::CloseCode;
use thiserror::Error;

/// Errors that end a gateway session
///
/// These are the only errors that escape the session loop. Each one is also
/// delivered once to the event sink.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway endpoint could not be resolved for a fresh connect
    #[error("Endpoint resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The transport failed in a way the reconnect loop does not absorb
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Server invalidated the session and refused a resume
    #[error("Invalid session: the server will not resume this session")]
    InvalidSession,

    /// Server closed the socket with a code that must not be retried
    #[error("Gateway closed the connection: {}", CloseCode::describe(*code))]
    Closed { code: Option<u16> },

    /// The session task is gone
    #[error("Session has shut down")]
    Shutdown,

    /// The session could not be built
    #[error("Invalid session configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Close code attached to this error, if any
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Closed { code } => *code,
            _ => None,
        }
    }
}

/// Transport (socket) errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the socket failed
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Writing a frame failed
    #[error("Failed to send frame: {0}")]
    Send(String),

    /// The socket is already closed
    #[error("Socket is closed")]
    Closed,
}

/// Endpoint resolver errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server asked us to slow down
    #[error("Rate limited (retry_after={retry_after:?}s)")]
    RateLimited { retry_after: Option<f64> },

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl ResolveError {
    /// Check if a later attempt may succeed
    ///
    /// Network failures, rate limits and server errors are transient; any
    /// other status (bad token, missing route) will not fix itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
        }
    }
}

/// Frame decoding errors
///
/// Never fatal: the session logs and drops the frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Binary frame is not valid zlib/UTF-8
    #[error("Failed to inflate frame: {0}")]
    Inflate(#[source] std::io::Error),

    /// Frame is not a valid gateway message
    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed frame with an op code this client does not know
    #[error("Unknown op code {op}")]
    UnknownOp { op: u64, seq: Option<u64> },
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
