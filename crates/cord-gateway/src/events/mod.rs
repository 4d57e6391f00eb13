//! Gateway events
//!
//! Dispatch event names and the typed view of the handshake events.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{DispatchEvent, ReadyEvent, UnavailableGuild};
