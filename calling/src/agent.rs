//! Remote request agent.
//!
//! One station operator's point of control. The agent never touches queue
//! state itself: it publishes intents and replaces its cached [`Snapshot`]
//! whenever the authority broadcasts one.
//!
//! Connectivity is "has ever seen a snapshot". Until then a poll timer
//! re-sends `REQUEST_INITIAL_STATE` every interval; the timer keeps running
//! afterwards but stays quiet.

use crate::model::{Line, ServiceLine, Snapshot, StationId};
use crate::protocol::{Intent, QueueMessage};
use queue_relay_core::effect::Effect;
use queue_relay_core::message_bus::{Envelope, MessageBus, ParticipantId};
use queue_relay_core::reducer::Reducer;
use queue_relay_core::{SmallVec, delay, publish, smallvec};
use std::sync::Arc;
use std::time::Duration;

/// Default poll interval while waiting for the authority.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Whether the agent has heard from an authority yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// No snapshot seen yet
    #[default]
    NotConnected,
    /// At least one snapshot seen
    Connected,
}

/// Agent state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    /// Station this agent speaks for
    pub station: StationId,
    /// Latest snapshot, replaced wholesale on every broadcast
    pub view: Option<Snapshot>,
    /// Connectivity flag
    pub connectivity: Connectivity,
    /// Whether the poll timer is armed
    pub polling: bool,
}

impl AgentState {
    /// Fresh, disconnected agent for `station`.
    #[must_use]
    pub const fn new(station: StationId) -> Self {
        Self {
            station,
            view: None,
            connectivity: Connectivity::NotConnected,
            polling: false,
        }
    }

    /// Whether a snapshot has ever been received.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connectivity == Connectivity::Connected
    }

    /// Cached counters for `line`.
    #[must_use]
    pub fn line(&self, line: Line) -> Option<&ServiceLine> {
        self.view.as_ref().map(|view| view.line(line))
    }

    /// Ticket this station currently holds on `line`, per the cached view.
    #[must_use]
    pub fn my_last_number(&self, line: Line) -> Option<u32> {
        self.view
            .as_ref()
            .and_then(|view| view.stations.matches(self.station, line))
    }

    /// Number the next issue on `line` would hand out, per the cached view.
    #[must_use]
    pub fn next_number(&self, line: Line) -> Option<u32> {
        self.line(line)
            .map(|counters| counters.current_number.saturating_add(1))
    }

    /// Whether a recall on `line` should be offered.
    #[must_use]
    pub fn can_recall(&self, line: Line) -> bool {
        self.is_connected() && self.my_last_number(line).is_some()
    }
}

/// Agent actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// The agent became active: ask for state and start polling
    Activate,
    /// Poll timer fired
    PollTick,
    /// Operator switched stations
    SelectStation(StationId),
    /// Operator asked for the next ticket
    RequestIssue(Line),
    /// Operator asked to call the current ticket again
    RequestRecall(Line),
    /// Operator asked to zero a line
    RequestReset(Line),
    /// A snapshot arrived from the authority
    SnapshotReceived(Snapshot),
}

impl AgentAction {
    /// Map bus traffic to agent actions; requests from other agents are ignored.
    #[must_use]
    pub fn from_message(message: QueueMessage) -> Option<Self> {
        message.into_snapshot().map(Self::SnapshotReceived)
    }
}

/// Agent environment
pub struct AgentEnvironment {
    /// Bus intents are published on
    pub bus: Arc<dyn MessageBus>,
    /// This agent's identity on the bus
    pub participant: ParticipantId,
    /// Interval between snapshot requests
    pub poll_interval: Duration,
}

impl AgentEnvironment {
    /// Create an environment with a fresh participant id.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, poll_interval: Duration) -> Self {
        Self {
            bus,
            participant: ParticipantId::new(),
            poll_interval,
        }
    }
}

/// Agent reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentReducer;

impl AgentReducer {
    /// Create a new agent reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn send(intent: Intent, env: &AgentEnvironment) -> Effect<AgentAction> {
        let message = QueueMessage::from(intent);
        match Envelope::from_message(env.participant, &message) {
            Ok(envelope) => publish! {
                bus: env.bus,
                envelope: envelope
            },
            Err(error) => {
                tracing::error!(%error, ?intent, "Failed to encode intent");
                Effect::None
            },
        }
    }

    fn schedule_poll(env: &AgentEnvironment) -> Effect<AgentAction> {
        delay! {
            duration: env.poll_interval,
            action: AgentAction::PollTick
        }
    }
}

impl Reducer for AgentReducer {
    type State = AgentState;
    type Action = AgentAction;
    type Environment = AgentEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AgentAction::Activate => {
                let request = Self::send(Intent::SnapshotRequest, env);
                if state.polling {
                    return smallvec![request];
                }
                state.polling = true;
                tracing::debug!(station = %state.station, "Agent active, requesting state");
                smallvec![request, Self::schedule_poll(env)]
            },

            AgentAction::PollTick => {
                if state.is_connected() {
                    smallvec![Self::schedule_poll(env)]
                } else {
                    tracing::debug!(station = %state.station, "Still waiting for the authority");
                    smallvec![Self::send(Intent::SnapshotRequest, env), Self::schedule_poll(env)]
                }
            },

            AgentAction::SelectStation(station) => {
                tracing::info!(from = %state.station, to = %station, "Station changed");
                state.station = station;
                smallvec![Effect::None]
            },

            AgentAction::RequestIssue(line) => {
                if !state.is_connected() {
                    tracing::debug!(%line, "Not connected, issue not sent");
                    return smallvec![Effect::None];
                }
                smallvec![Self::send(
                    Intent::Issue {
                        line,
                        station: state.station,
                    },
                    env
                )]
            },

            AgentAction::RequestRecall(line) => {
                if !state.can_recall(line) {
                    tracing::debug!(%line, station = %state.station, "Nothing to recall, not sent");
                    return smallvec![Effect::None];
                }
                smallvec![Self::send(
                    Intent::Recall {
                        line,
                        station: state.station,
                    },
                    env
                )]
            },

            AgentAction::RequestReset(line) => smallvec![Self::send(Intent::Reset { line }, env)],

            AgentAction::SnapshotReceived(snapshot) => {
                if !state.is_connected() {
                    tracing::info!(station = %state.station, "Connected to authority");
                }
                state.view = Some(snapshot);
                state.connectivity = Connectivity::Connected;
                smallvec![Effect::None]
            },
        }
    }
}
