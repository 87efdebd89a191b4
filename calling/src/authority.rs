//! The sequence authority.
//!
//! The only writer of the queue state. It applies one [`Intent`] at a time
//! and answers every accepted intent with the full [`Snapshot`], published
//! before the next intent is looked at. Issues and recalls also raise an
//! [`Announcement`], delivered in the background.
//!
//! ## Example
//!
//! ```ignore
//! let env = AuthorityEnvironment::new(SystemClock, bus, Arc::new(TracingAnnouncer), offset);
//! let store = Store::new(AuthorityState::new(StationId::range(5)), AuthorityReducer::new(), env);
//! store.send(Intent::Issue { line: Line::Visit, station }).await?;
//! ```

use crate::announcer::{Announcement, Announcer};
use crate::model::{
    Line, ServiceLine, Snapshot, StationId, StationRecord, StationTable, format_called_at,
};
use crate::protocol::{Intent, QueueMessage};
use chrono::FixedOffset;
use metrics::counter;
use queue_relay_core::effect::Effect;
use queue_relay_core::environment::Clock;
use queue_relay_core::message_bus::{Envelope, MessageBus, ParticipantId};
use queue_relay_core::reducer::Reducer;
use queue_relay_core::{SmallVec, async_effect, publish, smallvec};
use std::marker::PhantomData;
use std::sync::Arc;

/// Ground-truth queue state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityState {
    /// The visit line
    pub visit: ServiceLine,
    /// The food line
    pub food: ServiceLine,
    /// Latest record per configured station
    pub stations: StationTable,
}

impl AuthorityState {
    /// Zeroed state over the given stations.
    pub fn new(stations: impl IntoIterator<Item = StationId>) -> Self {
        Self {
            visit: ServiceLine::default(),
            food: ServiceLine::default(),
            stations: StationTable::with_stations(stations),
        }
    }

    /// Counters for `line`.
    #[must_use]
    pub const fn line(&self, line: Line) -> &ServiceLine {
        match line {
            Line::Visit => &self.visit,
            Line::Food => &self.food,
        }
    }

    const fn line_mut(&mut self, line: Line) -> &mut ServiceLine {
        match line {
            Line::Visit => &mut self.visit,
            Line::Food => &mut self.food,
        }
    }

    /// A copy of the whole state for broadcasting.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            visit: self.visit.clone(),
            food: self.food.clone(),
            stations: self.stations.clone(),
        }
    }
}

/// Authority environment
///
/// Everything the authority needs from the outside world.
pub struct AuthorityEnvironment<C: Clock, N: Announcer> {
    /// Source of call times
    pub clock: C,
    /// Bus snapshots are published on
    pub bus: Arc<dyn MessageBus>,
    /// Where announcements go
    pub announcer: Arc<N>,
    /// This authority's identity on the bus
    pub participant: ParticipantId,
    /// Offset used to render `lastCalled` and record timestamps
    pub utc_offset: FixedOffset,
}

impl<C: Clock, N: Announcer> AuthorityEnvironment<C, N> {
    /// Create an environment with a fresh participant id.
    #[must_use]
    pub fn new(clock: C, bus: Arc<dyn MessageBus>, announcer: Arc<N>, utc_offset: FixedOffset) -> Self {
        Self {
            clock,
            bus,
            announcer,
            participant: ParticipantId::new(),
            utc_offset,
        }
    }

    fn called_at(&self) -> String {
        format_called_at(self.clock.now(), self.utc_offset)
    }
}

/// Authority reducer
///
/// Generic over the clock and the announcer so tests can pin both.
#[derive(Debug, Clone, Copy)]
pub struct AuthorityReducer<C, N> {
    _phantom: PhantomData<(C, N)>,
}

impl<C, N> AuthorityReducer<C, N> {
    /// Create a new authority reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<C, N> Default for AuthorityReducer<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, N> AuthorityReducer<C, N>
where
    C: Clock,
    N: Announcer + 'static,
{
    /// Publish the current snapshot.
    fn broadcast(state: &AuthorityState, env: &AuthorityEnvironment<C, N>) -> Effect<Intent> {
        let message = QueueMessage::SyncState(state.snapshot());
        match Envelope::from_message(env.participant, &message) {
            Ok(envelope) => {
                counter!("queue_snapshots_published_total").increment(1);
                publish! {
                    bus: env.bus,
                    envelope: envelope
                }
            },
            Err(error) => {
                tracing::error!(%error, "Failed to encode snapshot");
                Effect::None
            },
        }
    }

    /// Hand an announcement to the announcer without waiting for it.
    fn announce(env: &AuthorityEnvironment<C, N>, announcement: Announcement) -> Effect<Intent> {
        let announcer = Arc::clone(&env.announcer);
        async_effect! {
            if let Err(error) = announcer.announce(announcement).await {
                counter!("queue_announcements_failed_total").increment(1);
                tracing::warn!(
                    %error,
                    line = %announcement.line,
                    number = announcement.number,
                    station = %announcement.station,
                    "Announcement not delivered"
                );
            }
            None
        }
    }

    /// Whether `station` is one of ours; logs the rejection otherwise.
    fn accepts(state: &AuthorityState, station: StationId, intent: Intent) -> bool {
        let known = state.stations.contains(station);
        if !known {
            tracing::warn!(?intent, %station, "Intent for unknown station dropped");
        }
        known
    }
}

impl<C, N> Reducer for AuthorityReducer<C, N>
where
    C: Clock,
    N: Announcer + 'static,
{
    type State = AuthorityState;
    type Action = Intent;
    type Environment = AuthorityEnvironment<C, N>;

    fn reduce(
        &self,
        state: &mut Self::State,
        intent: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match intent {
            Intent::Issue { line, station } => {
                if !Self::accepts(state, station, intent) {
                    return smallvec![Effect::None];
                }

                let at = env.called_at();
                let Some(number) = state.line_mut(line).issue(station, at.clone()) else {
                    tracing::warn!(%line, %station, "Ticket numbers exhausted, reset the line");
                    return smallvec![Effect::None];
                };
                state.stations.record(
                    station,
                    StationRecord {
                        service: line,
                        number,
                        timestamp: at,
                    },
                );

                counter!("queue_tickets_issued_total", "line" => line.wire_name()).increment(1);
                tracing::info!(%line, number, %station, "Ticket issued");

                smallvec![
                    Self::broadcast(state, env),
                    Self::announce(env, Announcement { line, number, station }),
                ]
            },

            Intent::Recall { line, station } => {
                let Some(number) = state.stations.matches(station, line) else {
                    counter!("queue_recalls_ignored_total", "line" => line.wire_name()).increment(1);
                    tracing::debug!(%line, %station, "Nothing to recall");
                    return smallvec![Effect::None];
                };

                let at = env.called_at();
                state.line_mut(line).touch(station, at.clone());
                state.stations.record(
                    station,
                    StationRecord {
                        service: line,
                        number,
                        timestamp: at,
                    },
                );

                counter!("queue_recalls_total", "line" => line.wire_name()).increment(1);
                tracing::info!(%line, number, %station, "Ticket recalled");

                smallvec![
                    Self::broadcast(state, env),
                    Self::announce(env, Announcement { line, number, station }),
                ]
            },

            Intent::Reset { line } => {
                state.line_mut(line).reset();
                let cleared = state.stations.clear_line(line);

                counter!("queue_resets_total", "line" => line.wire_name()).increment(1);
                tracing::info!(%line, cleared, "Line reset");

                smallvec![Self::broadcast(state, env)]
            },

            Intent::SnapshotRequest => {
                tracing::debug!("Snapshot requested");
                smallvec![Self::broadcast(state, env)]
            },
        }
    }
}
