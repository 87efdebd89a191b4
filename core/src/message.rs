//! Message trait and related types for the bus wire format.
//!
//! Messages are small tagged records. They are serialized with `serde_json` so
//! every participant, whatever it is written in, reads the same shape:
//!
//! ```text
//! { "type": "REQUEST_NEXT_VISIT", "payload": { "station": 2 } }
//! ```
//!
//! # Example
//!
//! ```
//! use queue_relay_core::message::Message;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! #[serde(tag = "type", content = "payload")]
//! enum PingMessage {
//!     #[serde(rename = "PING")]
//!     Ping,
//! }
//!
//! impl Message for PingMessage {
//!     fn message_type(&self) -> &'static str {
//!         "PING"
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Error types for message encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Failed to serialize message to bytes.
    #[error("Failed to serialize message: {0}")]
    SerializationError(String),

    /// Failed to deserialize message from bytes.
    #[error("Failed to deserialize message: {0}")]
    DeserializationError(String),
}

/// A message that can travel on the bus.
///
/// `message_type()` returns the wire tag (for example `"SYNC_STATE"`). It is
/// copied onto the envelope so receivers can log and filter without decoding
/// the payload.
pub trait Message: Send + Sync + 'static {
    /// Returns the wire tag of this message.
    fn message_type(&self) -> &'static str;

    /// Serialize this message to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::SerializationError` if the message cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, MessageError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| MessageError::SerializationError(e.to_string()))
    }

    /// Deserialize a message from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::DeserializationError` if the bytes are not a valid
    /// message of this type (unknown tag, missing payload, wrong field types).
    fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| MessageError::DeserializationError(e.to_string()))
    }
}
