//! Integration tests for stores talking over a `BroadcastBus`
//!
//! A responder store answers every `PING` with a `PONG` through
//! `Effect::Publish`, while plain subscriptions listen in. This covers the
//! driver loop, inline publishing, delayed actions and shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use futures::StreamExt;
use queue_relay_core::effect::Effect;
use queue_relay_core::message_bus::{Envelope, MessageBus, ParticipantId};
use queue_relay_core::reducer::Reducer;
use queue_relay_core::{SmallVec, delay, publish, smallvec};
use queue_relay_runtime::driver::drive;
use queue_relay_runtime::{BroadcastBus, Store, StoreError};
use queue_relay_testing::RecordingBus;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Action {
    /// Heard a ping carrying a sequence number
    Ping(u32),
    /// Publish `count` pongs in one reduction
    Burst(u32),
    /// Schedule a ping to self
    PingLater(Duration),
}

#[derive(Debug, Clone, Default)]
struct Responder {
    answered: Vec<u32>,
}

struct Env {
    bus: Arc<dyn MessageBus>,
    me: ParticipantId,
}

impl Env {
    fn pong(&self, n: u32) -> Effect<Action> {
        publish! {
            bus: self.bus,
            envelope: Envelope::new(self.me, "PONG".to_string(), n.to_be_bytes().to_vec())
        }
    }
}

struct ResponderReducer;

impl Reducer for ResponderReducer {
    type State = Responder;
    type Action = Action;
    type Environment = Env;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            Action::Ping(n) => {
                state.answered.push(n);
                smallvec![env.pong(n)]
            },
            Action::Burst(count) => (1..=count).map(|n| env.pong(n)).collect(),
            Action::PingLater(after) => smallvec![delay! {
                duration: after,
                action: Action::Ping(0)
            }],
        }
    }
}

type ResponderStore = Store<Responder, Action, Env, ResponderReducer>;

fn decode_ping(envelope: &Envelope) -> Option<Action> {
    if envelope.message_type != "PING" {
        return None;
    }
    let bytes: [u8; 4] = envelope.data.as_slice().try_into().ok()?;
    Some(Action::Ping(u32::from_be_bytes(bytes)))
}

fn ping(origin: ParticipantId, n: u32) -> Envelope {
    Envelope::new(origin, "PING".to_string(), n.to_be_bytes().to_vec())
}

fn pong_number(envelope: &Envelope) -> u32 {
    u32::from_be_bytes(envelope.data.as_slice().try_into().unwrap())
}

fn responder(bus: &Arc<BroadcastBus>) -> (ResponderStore, tokio::task::JoinHandle<Result<(), StoreError>>) {
    let me = ParticipantId::new();
    let stream = bus.subscribe(me).unwrap();
    let env = Env {
        bus: bus.clone(),
        me,
    };
    let store = Store::new(Responder::default(), ResponderReducer, env);
    let task = tokio::spawn(drive(store.clone(), stream, decode_ping));
    (store, task)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_request_gets_a_reply_over_the_bus() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);

    let client = ParticipantId::new();
    let mut replies = bus.subscribe(client).unwrap();
    bus.publish(ping(client, 7)).unwrap();

    let reply = tokio::time::timeout(TIMEOUT, replies.next()).await.unwrap().unwrap();
    assert_eq!(reply.message_type, "PONG");
    assert_eq!(pong_number(&reply), 7);
    assert_eq!(store.state(|s| s.answered.clone()).await, vec![7]);

    store.shutdown(TIMEOUT).await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_publishes_from_one_reduction_arrive_in_order() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);
    let mut listener = bus.subscribe(ParticipantId::new()).unwrap();

    store.send(Action::Burst(20)).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..20 {
        let envelope = tokio::time::timeout(TIMEOUT, listener.next()).await.unwrap().unwrap();
        seen.push(pong_number(&envelope));
    }
    assert_eq!(seen, (1..=20).collect::<Vec<_>>());

    store.shutdown(TIMEOUT).await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_requests_are_answered_one_at_a_time_in_delivery_order() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);
    let client = ParticipantId::new();
    let mut replies = bus.subscribe(client).unwrap();

    for n in 1..=10 {
        bus.publish(ping(client, n)).unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..10 {
        let envelope = tokio::time::timeout(TIMEOUT, replies.next()).await.unwrap().unwrap();
        seen.push(pong_number(&envelope));
    }
    assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    assert_eq!(store.state(|s| s.answered.clone()).await, seen);

    store.shutdown(TIMEOUT).await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_delayed_action_feeds_back_into_the_store() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);
    let mut listener = bus.subscribe(ParticipantId::new()).unwrap();

    let mut handle = store.send(Action::PingLater(Duration::from_millis(10))).await.unwrap();
    assert_eq!(handle.pending(), 1);
    handle.wait_with_timeout(TIMEOUT).await.unwrap();

    let reply = tokio::time::timeout(TIMEOUT, listener.next()).await.unwrap().unwrap();
    assert_eq!(pong_number(&reply), 0);

    store.shutdown(TIMEOUT).await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_the_driver_and_rejects_actions() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);

    store.shutdown(TIMEOUT).await.unwrap();
    tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();

    // Traffic after shutdown goes unanswered.
    let client = ParticipantId::new();
    bus.publish(ping(client, 1)).unwrap();
    assert!(matches!(
        store.send(Action::Ping(1)).await,
        Err(StoreError::ShutdownInProgress)
    ));
    assert!(store.state(|s| s.answered.is_empty()).await);
}

#[tokio::test]
async fn test_shutdown_times_out_on_long_delay() {
    let bus = Arc::new(BroadcastBus::default());
    let (store, task) = responder(&bus);

    store.send(Action::PingLater(Duration::from_secs(60))).await.unwrap();

    let result = store.shutdown(Duration::from_millis(30)).await;
    assert!(matches!(result, Err(StoreError::ShutdownTimeout(1))));
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_publish_has_happened_when_send_returns() {
    let bus = Arc::new(RecordingBus::new());
    let env = Env {
        bus: bus.clone(),
        me: ParticipantId::new(),
    };
    let store = Store::new(Responder::default(), ResponderReducer, env);

    store.send(Action::Burst(3)).await.unwrap();
    assert_eq!(bus.published_types(), vec!["PONG", "PONG", "PONG"]);

    store.shutdown(TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_failed_publish_does_not_fail_send() {
    let bus = Arc::new(RecordingBus::new());
    bus.close();
    let env = Env {
        bus: bus.clone(),
        me: ParticipantId::new(),
    };
    let store = Store::new(Responder::default(), ResponderReducer, env);

    assert!(store.send(Action::Ping(4)).await.is_ok());
    assert!(bus.published().is_empty());
    assert_eq!(store.state(|s| s.answered.clone()).await, vec![4]);

    store.shutdown(TIMEOUT).await.unwrap();
}
