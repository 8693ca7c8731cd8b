//! JSON codec for Parley messages.
//!
//! Each WebSocket text frame carries exactly one message, so there is no
//! length prefix; the only framing concern is the size limit.

use serde_json::Value;
use thiserror::Error;

use crate::messages::{ClientMessage, ServerMessage, CLIENT_MESSAGE_TYPES};

/// Maximum message size (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds the size limit.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Payload is not a JSON object.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The `type` field is absent or not a string.
    #[error("Message has no type")]
    MissingType,

    /// The `type` field names no known message.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// Known type with missing or mistyped fields.
    #[error("Invalid {kind} message: {reason}")]
    InvalidPayload { kind: String, reason: String },

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolError::MessageTooLarge { .. } => "too_large",
            ProtocolError::Malformed(_) => "malformed",
            ProtocolError::MissingType => "missing_type",
            ProtocolError::UnknownType(_) => "unknown_type",
            ProtocolError::InvalidPayload { .. } => "invalid_payload",
            ProtocolError::Encode(_) => "encode",
        }
    }
}

/// Encode a server message to JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(message: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a client message from JSON text using the default size limit.
///
/// # Errors
///
/// Returns an error if the text is too large, not a JSON object, or does not
/// describe a known message.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    decode_with_limit(text, MAX_MESSAGE_SIZE)
}

/// Decode a client message, rejecting payloads longer than `max_size` bytes.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_with_limit(text: &str, max_size: usize) -> Result<ClientMessage, ProtocolError> {
    if text.len() > max_size {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: max_size,
        });
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = match &value {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(ProtocolError::MissingType),
        },
        _ => return Err(ProtocolError::Malformed("expected a JSON object".into())),
    };

    if !CLIENT_MESSAGE_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Decode a server message from JSON text.
///
/// Used by clients and tests; the hub itself only decodes client messages.
///
/// # Errors
///
/// Returns an error if the text does not describe a server message.
pub fn decode_server(text: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
