//! Frame codec
//!
//! Text frames are JSON. Binary frames are zlib-compressed JSON, sent by the
//! server when Identify asked for compression.

use super::{GatewayMessage, OpCode};
use crate::error::CodecError;
use flate2::read::ZlibDecoder;
use serde::Deserialize;
use std::io::Read;

/// The keys every frame carries whatever its op
#[derive(Deserialize)]
struct Envelope {
    op: u64,
    #[serde(default)]
    s: Option<u64>,
}

/// Decode a text frame
///
/// A frame whose op code is unknown fails with [`CodecError::UnknownOp`],
/// which still carries the frame's sequence number.
pub fn decode_text(text: &str) -> Result<GatewayMessage, CodecError> {
    let error = match GatewayMessage::from_json(text) {
        Ok(message) => return Ok(message),
        Err(e) => e,
    };
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope { op, s }) if u8::try_from(op).ok().and_then(OpCode::from_u8).is_none() => {
            Err(CodecError::UnknownOp { op, seq: s })
        }
        _ => Err(error.into()),
    }
}

/// Inflate and decode a binary frame
pub fn decode_binary(data: &[u8]) -> Result<GatewayMessage, CodecError> {
    let mut json = String::new();
    ZlibDecoder::new(data)
        .read_to_string(&mut json)
        .map_err(CodecError::Inflate)?;
    decode_text(&json)
}

/// Encode a frame for sending
pub fn encode(message: &GatewayMessage) -> Result<String, CodecError> {
    Ok(message.to_json()?)
}
