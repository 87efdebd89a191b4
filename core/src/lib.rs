//! # Queue Relay Core
//!
//! Core traits and types for the queue relay architecture.
//!
//! Every participant on the message bus (the single authority and any number of
//! remote agents) is modelled the same way: owned state, a reducer that applies
//! one action at a time, and effect descriptions that the runtime executes.
//!
//! ## Core Concepts
//!
//! - **State**: Owned by exactly one participant, never aliased by another
//! - **Action**: Every input a participant reacts to (decoded bus messages, local commands, timer ticks)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (publish, delay, async work)
//! - **Environment**: Injected dependencies (clock, bus, collaborators)
//!
//! ## Example
//!
//! ```ignore
//! use queue_relay_core::*;
//!
//! impl Reducer for TicketReducer {
//!     type State = TicketState;
//!     type Action = TicketAction;
//!     type Environment = TicketEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut TicketState,
//!         action: TicketAction,
//!         env: &TicketEnvironment,
//!     ) -> SmallVec<[Effect<TicketAction>; 4]> {
//!         match action {
//!             TicketAction::Take => {
//!                 state.next += 1;
//!                 smallvec![Effect::None]
//!             }
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Wire messages carried on the bus
pub mod message;

/// Broadcast-only message bus abstraction
pub mod message_bus;

/// Declarative macros for building effects
pub mod effect_macros;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime, in order
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution).
pub mod effect {
    use crate::message_bus::{Envelope, MessageBus};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Ordering
    ///
    /// `Publish` runs inline, in the order the reducer returned it, before the
    /// `send` that produced it completes. `Future` and `Delay` are spawned and
    /// complete whenever they complete.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Delayed action (poll timers)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Publish an envelope on the message bus (fire-and-forget)
        Publish {
            /// Bus to publish on
            bus: Arc<dyn MessageBus>,
            /// The message, already encoded
            envelope: Envelope,
        },
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Publish { envelope, .. } => f
                    .debug_struct("Effect::Publish")
                    .field("envelope", envelope)
                    .finish_non_exhaustive(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// The envelope this effect would publish, if it is a `Publish`
        #[must_use]
        pub const fn published_envelope(&self) -> Option<&Envelope> {
            match self {
                Effect::Publish { envelope, .. } => Some(envelope),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use queue_relay_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
        fn now(&self) -> DateTime<Utc> {
            (**self).now()
        }
    }
}
