//! # cord-gateway
//!
//! Client for a push-based real-time gateway: keeps exactly one logical session
//! alive over a WebSocket, heartbeating, tracking the sequence cursor and resuming
//! dropped connections instead of re-identifying.

pub mod error;
pub mod events;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod transport;

pub use error::{GatewayError, GatewayResult};
pub use events::{DispatchEvent, GatewayEventType, ReadyEvent};
pub use protocol::{
    CloseCode, GatewayMessage, IdentifyPayload, IdentifyProperties, Intents, OpCode,
    ResumePayload,
};
pub use resolver::{EndpointResolver, GatewayInfo, HttpEndpointResolver, StaticResolver};
pub use session::{
    GatewaySession, GatewaySessionBuilder, GatewaySessionConfig, HeartbeatTimer, SessionHandle,
    SessionState,
};
pub use sink::{ChannelSink, EventSink, GatewayEvent, TracingSink};
pub use transport::{Connector, SocketEvent, Transport, WebSocketConnector};
