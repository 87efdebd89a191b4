//! Bus protocol between agents and the authority.
//!
//! Messages are adjacently tagged JSON records:
//!
//! ```json
//! {"type": "REQUEST_NEXT_VISIT", "payload": {"station": 2}}
//! {"type": "SYNC_STATE", "payload": {"visit": {..}, "food": {..}, "stations": {..}}}
//! ```
//!
//! Requests without a body (`REQUEST_RESET_*`, `REQUEST_INITIAL_STATE`) are
//! written with `"payload": {}` but also accepted with no `payload` at all,
//! which is how older panels send them.
//!
//! Agents speak in [`Intent`]s; the authority answers every accepted intent
//! with a full [`Snapshot`].

use crate::model::{Line, Snapshot, StationId};
use queue_relay_core::message::Message;
use queue_relay_core::message_bus::Envelope;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload naming the requesting station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationPayload {
    /// Requesting station
    #[serde(alias = "counterId")]
    pub station: StationId,
}

/// Empty payload, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Everything that travels on the queue bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", try_from = "RawMessage")]
pub enum QueueMessage {
    /// Issue the next visit ticket
    #[serde(rename = "REQUEST_NEXT_VISIT")]
    RequestNextVisit(StationPayload),
    /// Issue the next food ticket
    #[serde(rename = "REQUEST_NEXT_FOOD")]
    RequestNextFood(StationPayload),
    /// Re-announce a station's visit ticket
    #[serde(rename = "REQUEST_RECALL_VISIT")]
    RequestRecallVisit(StationPayload),
    /// Re-announce a station's food ticket
    #[serde(rename = "REQUEST_RECALL_FOOD")]
    RequestRecallFood(StationPayload),
    /// Zero the visit line
    #[serde(rename = "REQUEST_RESET_VISIT")]
    RequestResetVisit(Empty),
    /// Zero the food line
    #[serde(rename = "REQUEST_RESET_FOOD")]
    RequestResetFood(Empty),
    /// Ask the authority to broadcast its state
    #[serde(rename = "REQUEST_INITIAL_STATE")]
    RequestInitialState(Empty),
    /// Full authoritative state
    #[serde(rename = "SYNC_STATE")]
    SyncState(Snapshot),
}

impl Message for QueueMessage {
    fn message_type(&self) -> &'static str {
        match self {
            Self::RequestNextVisit(_) => "REQUEST_NEXT_VISIT",
            Self::RequestNextFood(_) => "REQUEST_NEXT_FOOD",
            Self::RequestRecallVisit(_) => "REQUEST_RECALL_VISIT",
            Self::RequestRecallFood(_) => "REQUEST_RECALL_FOOD",
            Self::RequestResetVisit(_) => "REQUEST_RESET_VISIT",
            Self::RequestResetFood(_) => "REQUEST_RESET_FOOD",
            Self::RequestInitialState(_) => "REQUEST_INITIAL_STATE",
            Self::SyncState(_) => "SYNC_STATE",
        }
    }
}

/// Why an incoming record is not a [`QueueMessage`].
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The `type` tag names no known message
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// A message that needs a body arrived without one
    #[error("`{0}` requires a payload")]
    MissingPayload(&'static str),

    /// The body does not fit the message type
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A queue message as it arrives, before the tag is matched.
///
/// A JSON `null` payload counts as missing.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl RawMessage {
    fn body<T: DeserializeOwned>(self, tag: &'static str) -> Result<T, ProtocolError> {
        let payload = self.payload.ok_or(ProtocolError::MissingPayload(tag))?;
        Ok(serde_json::from_value(payload)?)
    }
}

impl TryFrom<RawMessage> for QueueMessage {
    type Error = ProtocolError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let message = match raw.kind.as_str() {
            "REQUEST_NEXT_VISIT" => Self::RequestNextVisit(raw.body("REQUEST_NEXT_VISIT")?),
            "REQUEST_NEXT_FOOD" => Self::RequestNextFood(raw.body("REQUEST_NEXT_FOOD")?),
            "REQUEST_RECALL_VISIT" => Self::RequestRecallVisit(raw.body("REQUEST_RECALL_VISIT")?),
            "REQUEST_RECALL_FOOD" => Self::RequestRecallFood(raw.body("REQUEST_RECALL_FOOD")?),
            // Bodiless requests ignore whatever payload they carry.
            "REQUEST_RESET_VISIT" => Self::RequestResetVisit(Empty {}),
            "REQUEST_RESET_FOOD" => Self::RequestResetFood(Empty {}),
            "REQUEST_INITIAL_STATE" => Self::RequestInitialState(Empty {}),
            "SYNC_STATE" => Self::SyncState(raw.body("SYNC_STATE")?),
            _ => return Err(ProtocolError::UnknownType(raw.kind)),
        };
        Ok(message)
    }
}

/// A request to mutate or query the authority's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Issue the next ticket on `line` to `station`
    Issue {
        /// Line to draw from
        line: Line,
        /// Requesting station
        station: StationId,
    },
    /// Re-announce what `station` holds on `line`
    Recall {
        /// Line of the ticket
        line: Line,
        /// Requesting station
        station: StationId,
    },
    /// Zero `line` and clear its station records
    Reset {
        /// Line to reset
        line: Line,
    },
    /// Broadcast the current state without changing it
    SnapshotRequest,
}

impl Intent {
    /// Station named by the intent, if any.
    #[must_use]
    pub const fn station(&self) -> Option<StationId> {
        match self {
            Self::Issue { station, .. } | Self::Recall { station, .. } => Some(*station),
            Self::Reset { .. } | Self::SnapshotRequest => None,
        }
    }
}

impl From<Intent> for QueueMessage {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Issue { line: Line::Visit, station } => {
                Self::RequestNextVisit(StationPayload { station })
            },
            Intent::Issue { line: Line::Food, station } => {
                Self::RequestNextFood(StationPayload { station })
            },
            Intent::Recall { line: Line::Visit, station } => {
                Self::RequestRecallVisit(StationPayload { station })
            },
            Intent::Recall { line: Line::Food, station } => {
                Self::RequestRecallFood(StationPayload { station })
            },
            Intent::Reset { line: Line::Visit } => Self::RequestResetVisit(Empty {}),
            Intent::Reset { line: Line::Food } => Self::RequestResetFood(Empty {}),
            Intent::SnapshotRequest => Self::RequestInitialState(Empty {}),
        }
    }
}

impl QueueMessage {
    /// The intent carried by a request message; `None` for `SYNC_STATE`.
    #[must_use]
    pub fn into_intent(self) -> Option<Intent> {
        let intent = match self {
            Self::RequestNextVisit(StationPayload { station }) => Intent::Issue {
                line: Line::Visit,
                station,
            },
            Self::RequestNextFood(StationPayload { station }) => Intent::Issue {
                line: Line::Food,
                station,
            },
            Self::RequestRecallVisit(StationPayload { station }) => Intent::Recall {
                line: Line::Visit,
                station,
            },
            Self::RequestRecallFood(StationPayload { station }) => Intent::Recall {
                line: Line::Food,
                station,
            },
            Self::RequestResetVisit(_) => Intent::Reset { line: Line::Visit },
            Self::RequestResetFood(_) => Intent::Reset { line: Line::Food },
            Self::RequestInitialState(_) => Intent::SnapshotRequest,
            Self::SyncState(_) => return None,
        };
        Some(intent)
    }

    /// The snapshot carried by `SYNC_STATE`; `None` for requests.
    #[must_use]
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            Self::SyncState(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Decode a queue message from an envelope, logging anything undecodable.
#[must_use]
pub fn decode(envelope: &Envelope) -> Option<QueueMessage> {
    match envelope.decode::<QueueMessage>() {
        Ok(message) => Some(message),
        Err(error) => {
            tracing::warn!(
                origin = %envelope.origin,
                message_type = %envelope.message_type,
                %error,
                "Dropping undecodable message"
            );
            None
        },
    }
}
