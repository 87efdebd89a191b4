//! Given/when/then harness for reducers
//!
//! A reducer is a pure function of `(state, action, environment)`, so a test
//! only needs a starting state, some actions and checks on what came out.
//! [`ReducerTest`] strings those together without a runtime.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use queue_relay_core::{effect::Effect, reducer::Reducer};

type StateCheck<S> = Box<dyn FnOnce(&S)>;
type EffectCheck<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Builder for a single reducer test
///
/// Actions given through `when_action` are reduced in order against the same
/// state. State checks see the final state; effect checks see only what the
/// last action returned.
///
/// # Example
///
/// ```ignore
/// use queue_relay_testing::{ReducerTest, assertions};
///
/// ReducerTest::new(AuthorityReducer::new())
///     .with_env(test_env())
///     .given_state(AuthorityState::new(StationId::range(5)))
///     .when_action(Intent::Issue { line: Line::Visit, station })
///     .then_state(|state| assert_eq!(state.visit.current_number, 1))
///     .then_effects(|effects| {
///         assert_eq!(assertions::published_types(effects), ["SYNC_STATE"]);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_checks: Vec<StateCheck<S>>,
    effect_checks: Vec<EffectCheck<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Start a test for `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_checks: Vec::new(),
            effect_checks: Vec::new(),
        }
    }

    /// Environment handed to every reduction
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// State before the first action
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue one more action
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Check the state after every action has been reduced
    #[must_use]
    pub fn then_state<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_checks.push(Box::new(check));
        self
    }

    /// Check the effects returned by the final action
    #[must_use]
    pub fn then_effects<F>(mut self, check: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_checks.push(Box::new(check));
        self
    }

    /// Reduce the queued actions, then run every check
    ///
    /// # Panics
    ///
    /// Panics when the state, the environment or any action is missing, and
    /// whenever a check fails.
    #[allow(clippy::panic)] // Test code can panic
    pub fn run(self) {
        let (Some(mut state), Some(env)) = (self.initial_state, self.environment) else {
            panic!("ReducerTest needs both given_state() and with_env() before run()");
        };
        assert!(!self.actions.is_empty(), "ReducerTest has no when_action() to reduce");

        let mut last = Vec::new();
        for action in self.actions {
            last = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        self.state_checks.into_iter().for_each(|check| check(&state));
        self.effect_checks.into_iter().for_each(|check| check(&last));
    }
}

/// Checks over a reducer's returned effects
pub mod assertions {
    use queue_relay_core::effect::Effect;

    /// Short name of an effect for failure messages.
    fn kind<A>(effect: &Effect<A>) -> String {
        match effect {
            Effect::None => "None".to_string(),
            Effect::Delay { duration, .. } => format!("Delay({duration:?})"),
            Effect::Future(_) => "Future".to_string(),
            Effect::Publish { envelope, .. } => format!("Publish({})", envelope.message_type),
        }
    }

    fn kinds<A>(effects: &[Effect<A>]) -> Vec<String> {
        effects.iter().map(kind).collect()
    }

    /// The reducer did nothing observable: no effects, or a lone `Effect::None`
    ///
    /// # Panics
    ///
    /// Panics on anything else.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A>(effects: &[Effect<A>]) {
        let idle = matches!(effects, [] | [Effect::None]);
        assert!(idle, "reducer returned effects: {:?}", kinds(effects));
    }

    /// Exactly `expected` effects came back
    ///
    /// # Panics
    ///
    /// Panics on a different count.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert!(
            effects.len() == expected,
            "wanted {expected} effects, got {:?}",
            kinds(effects)
        );
    }

    /// Some background work was started
    ///
    /// # Panics
    ///
    /// Panics when no `Effect::Future` is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        let found = effects.iter().any(|effect| matches!(effect, Effect::Future(_)));
        assert!(found, "no Future among {:?}", kinds(effects));
    }

    /// Something goes out on the bus
    ///
    /// # Panics
    ///
    /// Panics when no `Effect::Publish` is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_publish_effect<A>(effects: &[Effect<A>]) {
        assert!(
            !published_types(effects).is_empty(),
            "no Publish among {:?}",
            kinds(effects)
        );
    }

    /// Wire tags of the published envelopes, in publish order
    #[must_use]
    pub fn published_types<A>(effects: &[Effect<A>]) -> Vec<String> {
        effects
            .iter()
            .filter_map(Effect::published_envelope)
            .map(|envelope| envelope.message_type.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingBus;
    use queue_relay_core::message_bus::{Envelope, MessageBus, ParticipantId};
    use queue_relay_core::{SmallVec, async_effect, delay, publish, smallvec};
    use std::sync::Arc;
    use std::time::Duration;

    /// A one-line ticket dispenser.
    struct Dispenser;

    #[derive(Debug)]
    enum Press {
        Take,
        Announce,
        Idle,
        Later,
    }

    struct Wire {
        bus: Arc<dyn MessageBus>,
    }

    impl Reducer for Dispenser {
        type State = u32;
        type Action = Press;
        type Environment = Wire;

        fn reduce(
            &self,
            issued: &mut u32,
            action: Press,
            env: &Wire,
        ) -> SmallVec<[Effect<Press>; 4]> {
            match action {
                Press::Take => {
                    *issued += 1;
                    let envelope =
                        Envelope::new(ParticipantId::new(), "TICKET".to_string(), issued.to_be_bytes().to_vec());
                    smallvec![publish! { bus: env.bus, envelope: envelope }]
                },
                Press::Announce => smallvec![async_effect! { None }],
                Press::Idle => smallvec![Effect::None],
                Press::Later => smallvec![delay! {
                    duration: Duration::from_secs(1),
                    action: Press::Idle
                }],
            }
        }
    }

    fn wire() -> Wire {
        Wire {
            bus: Arc::new(RecordingBus::new()),
        }
    }

    #[test]
    fn test_state_accumulates_over_actions() {
        ReducerTest::new(Dispenser)
            .with_env(wire())
            .given_state(3)
            .when_action(Press::Take)
            .when_action(Press::Idle)
            .when_action(Press::Take)
            .then_state(|issued| assert_eq!(*issued, 5))
            .then_effects(|effects| {
                assert_eq!(assertions::published_types(effects), ["TICKET"]);
                assertions::assert_has_publish_effect(effects);
            })
            .run();
    }

    #[test]
    fn test_effect_checks_see_only_the_last_action() {
        ReducerTest::new(Dispenser)
            .with_env(wire())
            .given_state(0)
            .when_action(Press::Take)
            .when_action(Press::Idle)
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_future_and_delay_effects() {
        ReducerTest::new(Dispenser)
            .with_env(wire())
            .given_state(0)
            .when_action(Press::Announce)
            .then_effects(|effects| {
                assertions::assert_has_future_effect(effects);
                assertions::assert_effects_count(effects, 1);
            })
            .run();

        ReducerTest::new(Dispenser)
            .with_env(wire())
            .given_state(0)
            .when_action(Press::Later)
            .then_effects(|effects| {
                assert!(matches!(effects, [Effect::Delay { .. }]));
                assert!(assertions::published_types(effects).is_empty());
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "reducer returned effects")]
    fn test_no_effects_rejects_a_publish() {
        ReducerTest::new(Dispenser)
            .with_env(wire())
            .given_state(0)
            .when_action(Press::Take)
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    #[should_panic(expected = "needs both")]
    fn test_missing_environment_is_reported() {
        ReducerTest::<Dispenser, u32, Press, Wire>::new(Dispenser)
            .given_state(0)
            .when_action(Press::Idle)
            .run();
    }
}
