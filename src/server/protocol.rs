//! Wire format and schema validation.
//!
//! Messages are JSON, length-prefixed by the framing layer. Size limits are
//! enforced on both directions; generation output can be large, so the
//! default frame limit is far above typical RPC defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::SamplingParams;
use crate::prompt::ChatTurn;

/// Default maximum frame size: 128 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 128 * 1024 * 1024;

/// Malformed or empty input, rejected before a session exists.
pub const CODE_INVALID_REQUEST: u32 = 400;
/// The worker is draining and admits no new sessions.
pub const CODE_UNAVAILABLE: u32 = 503;
/// The engine failed mid-stream; the message carries its reason.
pub const CODE_ENGINE_FAILURE: u32 = 500;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Unique request identifier, chosen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// A streaming generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub request_id: RequestId,
    /// Free-form prompt. Mutually optional with `messages`; one must be set.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Ordered chat transcript, used when `prompt` is absent.
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    /// `0.0` disables sampling.
    #[serde(default)]
    pub temperature: f32,
    /// `0` means "use the default" (256).
    #[serde(default)]
    pub max_tokens: u32,
}

impl GenerateRequest {
    /// Reject malformed input before any session is created.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let has_prompt = self.prompt.as_deref().is_some_and(|p| !p.is_empty());
        if !has_prompt && self.messages.is_empty() {
            return Err(ProtocolError::MissingField("prompt or messages".into()));
        }
        if !has_prompt && self.messages.iter().any(|m| m.content.is_empty()) {
            return Err(ProtocolError::InvalidFormat(
                "message content cannot be empty".into(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ProtocolError::InvalidFormat(
                "temperature must be a finite value >= 0".into(),
            ));
        }
        Ok(())
    }

    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams::new(self.temperature, self.max_tokens)
    }
}

/// All wire message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Client -> worker: start a streaming generation.
    #[serde(rename = "generate")]
    Generate(GenerateRequest),

    /// Worker -> client: one text increment. Never batched, never reordered.
    #[serde(rename = "chunk")]
    Chunk { request_id: RequestId, text: String },

    /// Worker -> client: generation finished cleanly. Last message.
    #[serde(rename = "done")]
    Done { request_id: RequestId },

    /// Worker -> client: the request failed. Last message.
    #[serde(rename = "error")]
    Error {
        request_id: RequestId,
        code: u32,
        message: String,
    },
}

/// Encode a message to JSON bytes, enforcing the frame limit.
pub fn encode_message(message: &WireMessage, max_size: usize) -> Result<Vec<u8>, ProtocolError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > max_size {
        return Err(ProtocolError::FrameTooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    Ok(bytes)
}

/// Decode a message from JSON bytes.
///
/// The size check happens before parsing so oversized input never allocates.
pub fn decode_message(bytes: &[u8], max_size: usize) -> Result<WireMessage, ProtocolError> {
    if bytes.len() > max_size {
        return Err(ProtocolError::FrameTooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}
