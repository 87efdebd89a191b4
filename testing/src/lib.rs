//! # Queue Relay Testing
//!
//! Testing utilities and helpers for the queue relay architecture.
//!
//! This crate provides:
//! - Deterministic clocks
//! - A recording message bus
//! - A Given/When/Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use queue_relay_testing::{test_clock, RecordingBus};
//!
//! let bus = Arc::new(RecordingBus::new());
//! let env = AuthorityEnvironment::new(test_clock(), bus.clone(), ...);
//! // ... drive a reducer ...
//! assert!(bus.published().is_empty());
//! ```

use chrono::{DateTime, Utc};
use queue_relay_core::environment::Clock;

/// Ergonomic testing utilities for reducers
pub mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration as ChronoDuration;
    use queue_relay_core::message_bus::{
        Envelope, MessageBus, MessageBusError, MessageStream, ParticipantId,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use queue_relay_testing::mocks::FixedClock;
    /// use queue_relay_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that only moves when told to
    ///
    /// Useful for asserting that a timestamp was refreshed by a later action.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start the clock at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: ChronoDuration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Bus that records everything published and delivers nothing
    ///
    /// Subscriptions stay open forever without yielding, like a channel nobody
    /// else is talking on.
    #[derive(Debug, Default)]
    pub struct RecordingBus {
        published: Mutex<Vec<Envelope>>,
        closed: AtomicBool,
    }

    impl RecordingBus {
        /// Create an empty recording bus
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything published so far, in order
        #[must_use]
        pub fn published(&self) -> Vec<Envelope> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Message types published so far, in order
        #[must_use]
        pub fn published_types(&self) -> Vec<String> {
            self.published()
                .into_iter()
                .map(|envelope| envelope.message_type)
                .collect()
        }

        /// Forget everything recorded so far
        pub fn clear(&self) {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        /// Make every later publish fail with [`MessageBusError::Closed`]
        pub fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl MessageBus for RecordingBus {
        fn publish(&self, envelope: Envelope) -> Result<(), MessageBusError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(MessageBusError::Closed);
            }
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(envelope);
            Ok(())
        }

        fn subscribe(&self, _participant: ParticipantId) -> Result<MessageStream, MessageBusError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(MessageBusError::Closed);
            }
            Ok(Box::pin(futures::stream::pending()))
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, RecordingBus, test_clock};
