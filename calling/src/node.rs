//! Participant wiring.
//!
//! A node is one participant on the bus: a [`Store`] plus the driver task
//! feeding it bus traffic. Both spawn functions subscribe before the node
//! does anything, so no reply to its own first request can slip past.

use crate::agent::{AgentAction, AgentEnvironment, AgentReducer, AgentState};
use crate::announcer::{Announcer, TracingAnnouncer};
use crate::authority::{AuthorityEnvironment, AuthorityReducer, AuthorityState};
use crate::config::Config;
use crate::model::{Line, Snapshot, StationId};
use crate::protocol::{self, Intent};
use queue_relay_core::environment::{Clock, SystemClock};
use queue_relay_core::message_bus::{Envelope, MessageBus, MessageBusError, ParticipantId};
use queue_relay_core::reducer::Reducer;
use queue_relay_runtime::driver::drive;
use queue_relay_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Store type of an authority node.
pub type AuthorityStore<C, N> =
    Store<AuthorityState, Intent, AuthorityEnvironment<C, N>, AuthorityReducer<C, N>>;

/// Store type of an agent node.
pub type AgentStore = Store<AgentState, AgentAction, AgentEnvironment, AgentReducer>;

/// Errors starting or stopping a node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The bus refused the subscription
    #[error("Bus error: {0}")]
    Bus(#[from] MessageBusError),

    /// The store failed to start or stop cleanly
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A running authority.
pub struct AuthorityNode<C = SystemClock, N = TracingAnnouncer>
where
    C: Clock + 'static,
    N: Announcer + 'static,
{
    store: AuthorityStore<C, N>,
    task: JoinHandle<Result<(), StoreError>>,
}

/// Start an authority on `bus` with the wall clock.
///
/// # Errors
///
/// Returns [`NodeError::Bus`] if the bus refuses the subscription.
pub fn spawn_authority<N>(
    bus: Arc<dyn MessageBus>,
    config: &Config,
    announcer: Arc<N>,
) -> Result<AuthorityNode<SystemClock, N>, NodeError>
where
    N: Announcer + 'static,
{
    spawn_authority_with_clock(bus, config, announcer, SystemClock)
}

/// Start an authority on `bus` with a custom clock.
///
/// # Errors
///
/// Returns [`NodeError::Bus`] if the bus refuses the subscription.
pub fn spawn_authority_with_clock<C, N>(
    bus: Arc<dyn MessageBus>,
    config: &Config,
    announcer: Arc<N>,
    clock: C,
) -> Result<AuthorityNode<C, N>, NodeError>
where
    C: Clock + 'static,
    N: Announcer + 'static,
{
    let env = AuthorityEnvironment::new(clock, Arc::clone(&bus), announcer, config.utc_offset());
    let participant = env.participant;
    let stream = bus.subscribe(participant)?;

    let store = Store::new(
        AuthorityState::new(config.station_ids()),
        AuthorityReducer::new(),
        env,
    );
    let task = tokio::spawn(drive(store.clone(), stream, decode_intent));

    tracing::info!(%participant, stations = config.stations, "Authority started");
    Ok(AuthorityNode { store, task })
}

fn decode_intent(envelope: &Envelope) -> Option<Intent> {
    let intent = protocol::decode(envelope)?.into_intent();
    if intent.is_none() {
        tracing::debug!(origin = %envelope.origin, "Authority ignoring snapshot on the bus");
    }
    intent
}

impl<C, N> AuthorityNode<C, N>
where
    C: Clock + 'static,
    N: Announcer + 'static,
{
    /// This authority's identity on the bus.
    #[must_use]
    pub fn participant(&self) -> ParticipantId {
        self.store.environment().participant
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &AuthorityStore<C, N> {
        &self.store
    }

    /// The current state as it would be broadcast.
    pub async fn snapshot(&self) -> Snapshot {
        self.store.state(AuthorityState::snapshot).await
    }

    /// Wait until `predicate` holds for the state, up to `timeout`.
    pub async fn wait_until<F>(&self, predicate: F, timeout: Duration) -> bool
    where
        F: Fn(&AuthorityState) -> bool,
    {
        wait_until(&self.store, predicate, timeout).await
    }

    /// Stop taking intents and wait for in-flight announcements.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Store`] if effects outlive `timeout` or the driver failed.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), NodeError> {
        self.store.shutdown(timeout).await?;
        self.task.await.map_err(StoreError::from)??;
        tracing::info!("Authority stopped");
        Ok(())
    }
}

/// A running agent.
pub struct AgentNode {
    store: AgentStore,
    task: JoinHandle<Result<(), StoreError>>,
}

/// Start an agent for `station` on `bus`.
///
/// The agent asks for the current state right away and keeps polling every
/// `config.poll_interval` until an authority answers.
///
/// # Errors
///
/// Returns [`NodeError::Bus`] if the bus refuses the subscription, or
/// [`NodeError::Store`] if the agent could not be activated.
pub async fn spawn_agent(
    bus: Arc<dyn MessageBus>,
    config: &Config,
    station: StationId,
) -> Result<AgentNode, NodeError> {
    let env = AgentEnvironment::new(Arc::clone(&bus), config.poll_interval);
    let participant = env.participant;
    let stream = bus.subscribe(participant)?;

    let store = Store::new(AgentState::new(station), AgentReducer::new(), env);
    store.send(AgentAction::Activate).await?;

    let task = tokio::spawn(drive(store.clone(), stream, |envelope: &Envelope| {
        protocol::decode(envelope).and_then(AgentAction::from_message)
    }));

    tracing::info!(%participant, %station, "Agent started");
    Ok(AgentNode { store, task })
}

impl AgentNode {
    /// This agent's identity on the bus.
    #[must_use]
    pub fn participant(&self) -> ParticipantId {
        self.store.environment().participant
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Ask for the next ticket on `line`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn request_issue(&self, line: Line) -> Result<(), StoreError> {
        self.store.send(AgentAction::RequestIssue(line)).await?;
        Ok(())
    }

    /// Ask to call this station's ticket on `line` again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn request_recall(&self, line: Line) -> Result<(), StoreError> {
        self.store.send(AgentAction::RequestRecall(line)).await?;
        Ok(())
    }

    /// Ask to zero `line`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn request_reset(&self, line: Line) -> Result<(), StoreError> {
        self.store.send(AgentAction::RequestReset(line)).await?;
        Ok(())
    }

    /// Speak for another station from now on.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn select_station(&self, station: StationId) -> Result<(), StoreError> {
        self.store.send(AgentAction::SelectStation(station)).await?;
        Ok(())
    }

    /// A copy of the agent's state.
    pub async fn view(&self) -> AgentState {
        self.store.state(Clone::clone).await
    }

    /// Whether a snapshot has been received.
    pub async fn is_connected(&self) -> bool {
        self.store.state(AgentState::is_connected).await
    }

    /// Wait until `predicate` holds for the state, up to `timeout`.
    pub async fn wait_until<F>(&self, predicate: F, timeout: Duration) -> bool
    where
        F: Fn(&AgentState) -> bool,
    {
        wait_until(&self.store, predicate, timeout).await
    }

    /// Stop the poller and the driver.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Store`] if the pending poll outlives `timeout` or
    /// the driver failed.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), NodeError> {
        self.store.shutdown(timeout).await?;
        self.task.await.map_err(StoreError::from)??;
        tracing::info!("Agent stopped");
        Ok(())
    }
}

async fn wait_until<S, A, E, R, F>(store: &Store<S, A, E, R>, predicate: F, timeout: Duration) -> bool
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: Fn(&S) -> bool,
{
    let mut changes = store.subscribe_changes();
    let satisfied = async {
        loop {
            if store.state(|state| predicate(state)).await {
                return true;
            }
            if changes.changed().await.is_err() {
                return false;
            }
        }
    };
    tokio::time::timeout(timeout, satisfied).await.unwrap_or(false)
}
