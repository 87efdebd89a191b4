//! Message bus abstraction shared by every participant.
//!
//! This module provides the [`MessageBus`] trait: a broadcast-only,
//! fire-and-forget channel. Any participant can publish, and every *other*
//! participant with a live subscription receives the envelope.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  intent   ┌─────────────┐  snapshot  ┌──────────┐
//! │ Agent A  │──────────►│             │───────────►│ Agent A  │
//! └──────────┘           │  MessageBus │            └──────────┘
//! ┌──────────┐  intent   │  (fan-out)  │  snapshot  ┌──────────┐
//! │ Agent B  │──────────►│             │───────────►│ Agent B  │
//! └──────────┘           └──────┬──────┘            └──────────┘
//!                               │ intents
//!                               ▼
//!                        ┌─────────────┐
//!                        │  Authority  │
//!                        └─────────────┘
//! ```
//!
//! # Delivery Guarantees
//!
//! There are almost none, and callers must not assume more:
//!
//! - **No acknowledgment**: `publish` succeeding means "handed to the bus", nothing else
//! - **No persistence**: a subscription only sees envelopes published after it was created
//! - **No self-delivery**: a subscriber never receives envelopes it published itself
//! - **No cross-publisher ordering**: only the order in which one subscriber sees envelopes is defined
//! - **Lossy**: implementations may drop envelopes for slow subscribers
//!
//! # Implementations
//!
//! - `BroadcastBus` in the runtime crate - in-process fan-out over `tokio::sync::broadcast`
//! - `RecordingBus` in the testing crate - records every published envelope

use crate::message::{Message, MessageError};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Identity of one participant (one browsing context, one node).
///
/// Used only to suppress self-delivery. It is not an authentication token:
/// the authority never distinguishes senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Generate a fresh random participant id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An encoded message plus the identity of its publisher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Who published this envelope
    pub origin: ParticipantId,

    /// The wire tag of the message (e.g. `"SYNC_STATE"`)
    pub message_type: String,

    /// The JSON-encoded message
    pub data: Vec<u8>,
}

impl Envelope {
    /// Create an envelope from raw parts.
    #[must_use]
    pub const fn new(origin: ParticipantId, message_type: String, data: Vec<u8>) -> Self {
        Self {
            origin,
            message_type,
            data,
        }
    }

    /// Encode a [`Message`] into an envelope.
    ///
    /// # Errors
    ///
    /// Returns `MessageError::SerializationError` if the message cannot be serialized.
    pub fn from_message<M: Message + Serialize>(
        origin: ParticipantId,
        message: &M,
    ) -> Result<Self, MessageError> {
        Ok(Self {
            origin,
            message_type: message.message_type().to_string(),
            data: message.to_bytes()?,
        })
    }

    /// Decode the payload back into a [`Message`].
    ///
    /// # Errors
    ///
    /// Returns `MessageError::DeserializationError` if the payload is not a valid `M`.
    pub fn decode<M: Message + serde::de::DeserializeOwned>(&self) -> Result<M, MessageError> {
        M::from_bytes(&self.data)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Envelope {{ type: {}, origin: {}, size: {} bytes }}",
            self.message_type,
            self.origin,
            self.data.len()
        )
    }
}

/// Errors that can occur during bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageBusError {
    /// The bus has been closed and accepts no more publishers or subscribers
    #[error("Message bus closed")]
    Closed,

    /// Failed to subscribe
    #[error("Subscription failed for participant {participant}: {reason}")]
    SubscriptionFailed {
        /// The participant that tried to subscribe
        participant: ParticipantId,
        /// The reason for failure
        reason: String,
    },

    /// Failed to encode a message before publishing
    #[error("Encoding failed: {0}")]
    Encoding(#[from] MessageError),
}

/// Stream of envelopes delivered to one subscriber.
///
/// The stream ends when the bus is dropped or closed.
pub type MessageStream = Pin<Box<dyn Stream<Item = Envelope> + Send>>;

/// Trait for message bus implementations.
///
/// # Dyn Compatibility
///
/// Reducers hold the bus as `Arc<dyn MessageBus>` inside their environment, so
/// the trait stays object-safe. `publish` is synchronous: handing an envelope
/// to the bus never waits on any receiver, the same way `postMessage` does not.
pub trait MessageBus: Send + Sync {
    /// Publish an envelope to every other live subscriber.
    ///
    /// Succeeds even when nobody is listening; the envelope is then simply lost.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::Closed`] if the bus no longer accepts messages.
    fn publish(&self, envelope: Envelope) -> Result<(), MessageBusError>;

    /// Open a subscription for `participant`.
    ///
    /// The returned stream yields envelopes published after this call,
    /// excluding the participant's own.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SubscriptionFailed`] or [`MessageBusError::Closed`].
    fn subscribe(&self, participant: ParticipantId) -> Result<MessageStream, MessageBusError>;
}
