//! # Queue Relay Runtime
//!
//! Runtime implementation for the queue relay architecture.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling, the driver loop that feeds bus traffic into a store,
//! and an in-process broadcast bus.
//!
//! ## Core Components
//!
//! - **Store**: Owns one participant's state and applies actions one at a time
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Driver**: The per-participant event loop (`bus → decode → send`)
//! - **`BroadcastBus`**: Lossy fan-out bus with no self-delivery
//!
//! ## Example
//!
//! ```ignore
//! use queue_relay_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use queue_relay_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// In-process broadcast implementation of the message bus
pub mod bus;

/// Per-participant event loop
pub mod driver;

/// Prometheus metrics for observability
pub mod metrics;

pub use bus::BroadcastBus;
pub use store::Store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A task join error occurred during effect execution
        ///
        /// This typically means a spawned task panicked.
        #[error("Task failed during effect execution: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the spawned effects of
/// one action (announcements, delayed actions) to complete. `Publish` effects
/// have already run by the time the handle is returned.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of spawned effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Keeps the counter honest even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError, watch,
    };
    use crate::metrics::StoreMetrics;

    /// The Store - runtime coordinator for one participant
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; only the reducer writes it)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Every action is applied to completion before the next one is looked
    /// at: concurrent `send()` calls serialize on the write lock.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        shutdown_signal: Arc<watch::Sender<bool>>,
        pending_effects: Arc<AtomicUsize>,
        /// Bumped after every reduced action so observers can await changes.
        version: Arc<watch::Sender<u64>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let (shutdown_signal, _) = watch::channel(false);
            let (version, _) = watch::channel(0);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                shutdown_signal: Arc::new(shutdown_signal),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                version: Arc::new(version),
            }
        }

        /// The injected environment
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Whether `shutdown()` has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Resolves once `shutdown()` has been called
        pub async fn closed(&self) {
            let mut signal = self.shutdown_signal.subscribe();
            let _ = signal.wait_for(|closed| *closed).await;
        }

        /// Watch the number of actions reduced so far
        ///
        /// The value changes after every reduced action, which lets readers
        /// await "the next state change" instead of polling.
        #[must_use]
        pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
            self.version.subscribe()
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Rejects new actions
        /// 2. Wakes anything awaiting [`Store::closed`]
        /// 3. Waits for spawned effects to drain, up to `timeout`
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");

            self.shutdown.store(true, Ordering::Release);
            self.shutdown_signal.send_replace(true);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Runs `Publish` effects inline, still under the lock, so bus
        ///    order equals reducer order
        /// 4. Spawns the remaining effects, which may feed actions back
        ///
        /// `send()` returns after publishing, not after spawned effects finish;
        /// use the returned [`EffectHandle`] for that.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        ///
        /// # Panics
        ///
        /// If the reducer panics, the panic propagates. Reducers must not panic.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected();
                return Err(StoreError::ShutdownInProgress);
            }

            let (handle, tracking) = EffectHandle::new();

            {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                StoreMetrics::record_action(start.elapsed(), effects.len());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());

                for effect in effects {
                    self.execute_effect(effect, &tracking);
                }

                self.version.send_modify(|version| *version += 1);
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let connected = store.state(|s| s.is_connected()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Execute an effect with tracking
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Publish`: Hands the envelope to the bus right now; failures are logged
        /// - `Future`: Spawns the computation, sends resulting action if `Some`
        /// - `Delay`: Spawns a timer, then sends the action
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    StoreMetrics::record_effect("none");
                },
                Effect::Publish { bus, envelope } => {
                    StoreMetrics::record_effect("publish");
                    let message_type = envelope.message_type.clone();
                    match bus.publish(envelope) {
                        Ok(()) => tracing::debug!(message_type, "Published to bus"),
                        Err(error) => {
                            StoreMetrics::record_effect_failure("publish");
                            tracing::warn!(message_type, %error, "Publish failed, message dropped");
                        },
                    }
                },
                Effect::Future(fut) => {
                    StoreMetrics::record_effect("future");
                    let guards = self.track(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            if let Err(error) = store.send(action).await {
                                tracing::debug!(%error, "Feedback action rejected");
                            }
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    StoreMetrics::record_effect("delay");
                    let guards = self.track(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        tokio::time::sleep(duration).await;
                        tracing::trace!("Effect::Delay completed, sending action");

                        if let Err(error) = store.send(*action).await {
                            tracing::debug!(%error, "Delayed action rejected");
                        }
                    });
                },
            }
        }

        /// Count one spawned effect against both the action handle and shutdown.
        fn track(&self, tracking: &EffectTracking) -> (DecrementGuard, AtomicCounterGuard) {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            (
                DecrementGuard(tracking.clone()),
                AtomicCounterGuard(Arc::clone(&self.pending_effects)),
            )
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                shutdown_signal: Arc::clone(&self.shutdown_signal),
                pending_effects: Arc::clone(&self.pending_effects),
                version: Arc::clone(&self.version),
            }
        }
    }
}
