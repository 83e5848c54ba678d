//! Message payload codec
//!
//! Messages travel as the JSON object `{"body":"..."}`; framing is left to the
//! transport.

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Largest payload accepted in either direction
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// A discrete text message exchanged with one peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    body: String,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// Serialize a message for `send_reliable`
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(message).map_err(CodecError::Encode)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: payload.len(),
            max_size: MAX_MESSAGE_SIZE,
        });
    }
    Ok(payload)
}

/// Parse a payload received from a peer
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            max_size: MAX_MESSAGE_SIZE,
        });
    }
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}
