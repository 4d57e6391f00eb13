//! Gateway protocol definitions
//!
//! Op codes, frame format, handshake payloads, close codes and the frame codec.

pub mod codec;
mod close_codes;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use intents::Intents;
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload};
