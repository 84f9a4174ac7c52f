//! # Tasklist Runtime
//!
//! Runtime implementation for the tasklist client.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Effect Handles**: Let callers await the effects started by one action
//! - **Cancellation Registry**: Aborts running effects by [`EffectId`]
//! - **Result Watchers**: Route produced actions back to the caller awaiting them
//!
//! ## Example
//!
//! ```ignore
//! use tasklist_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action and wait until its effects have been applied
//! let mut handle = store.send(Action::DoSomething).await?;
//! handle.wait().await;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use futures::future::{AbortHandle, AbortRegistration};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tasklist_core::effect::{Effect, EffectId};
use tasklist_core::reducer::Reducer;
use tokio::sync::{mpsc, watch, RwLock};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
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

        /// The effects of an action completed without producing a matching action
        ///
        /// Returned by `send_and_wait_for` when the effect panicked or was
        /// cancelled before producing its result.
        #[error("Effects completed without producing a matching action")]
        NoMatchingAction,
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tasklist_runtime::StoreConfig;
///
/// let config = StoreConfig::default().with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.default_shutdown_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(default_shutdown_timeout: Duration) -> Self {
        Self {
            default_shutdown_timeout,
        }
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for effects to complete.
/// Each action gets a handle that resolves once every effect it started has
/// finished, including the reducer pass over any action those effects fed
/// back into the store.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait().await;
/// // All effects from Action::Start are now complete
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle and the tracking context feeding it
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

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so nothing can still be running
                break;
            }
        }
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
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics
/// or is aborted.
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

/// Internal: running cancellable effects keyed by id
///
/// Each registration gets a ticket so that a finishing effect only removes
/// its own entry, never the one that replaced it.
#[derive(Default)]
struct CancellationRegistry {
    next_ticket: AtomicU64,
    running: Mutex<HashMap<EffectId, (u64, AbortHandle)>>,
}

impl CancellationRegistry {
    /// Register a new effect under `id`, aborting the previous one
    fn register(&self, id: EffectId) -> (u64, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);

        let previous = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (ticket, handle));

        if let Some((_, previous)) = previous {
            previous.abort();
            tracing::trace!(effect_id = %id, "Replaced running cancellable effect");
            metrics::counter!("store.effects.cancelled").increment(1);
        }

        (ticket, registration)
    }

    /// Abort the effect registered under `id`
    fn cancel(&self, id: EffectId) -> bool {
        let removed = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match removed {
            Some((_, handle)) => {
                handle.abort();
                metrics::counter!("store.effects.cancelled").increment(1);
                true
            },
            None => false,
        }
    }

    /// Forget a completed effect, unless it has been replaced meanwhile
    fn finish(&self, id: EffectId, ticket: u64) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if running.get(&id).is_some_and(|(current, _)| *current == ticket) {
            running.remove(&id);
        }
    }
}

/// Predicate selecting the produced actions a watcher receives
type ActionFilter<A> = Box<dyn Fn(&A) -> bool + Send + Sync>;

/// Internal: callers waiting for actions produced by their effects
///
/// Each watcher owns an unbounded channel, so a burst of produced actions is
/// never dropped no matter how late the caller drains it.
struct ResultWatchers<A> {
    next_id: AtomicU64,
    active: Mutex<Vec<(u64, ActionFilter<A>, mpsc::UnboundedSender<A>)>>,
}

impl<A> Default for ResultWatchers<A> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            active: Mutex::new(Vec::new()),
        }
    }
}

impl<A: Clone> ResultWatchers<A> {
    /// Start routing actions accepted by `filter` to a new receiver
    fn register(&self, filter: ActionFilter<A>) -> (u64, mpsc::UnboundedReceiver<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, filter, tx));

        (id, rx)
    }

    /// Hand `action` to every watcher whose filter accepts it
    fn notify(&self, action: &A) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, filter, tx) in active.iter() {
            if filter(action) {
                let _ = tx.send(action.clone());
            }
        }
    }

    /// Stop routing actions to the watcher `id`
    fn remove(&self, id: u64) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(current, _, _)| *current != id);
    }
}

/// Internal: RAII guard that unregisters a watcher on drop
///
/// The caller of `send_and_collect` may be cancelled mid-wait; the watcher
/// must not outlive it.
struct WatchGuard<A: Clone> {
    watchers: Arc<ResultWatchers<A>>,
    id: u64,
}

impl<A: Clone> Drop for WatchGuard<A> {
    fn drop(&mut self) {
        self.watchers.remove(self.id);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, CancellationRegistry, DecrementGuard,
        Duration, Effect, EffectHandle, EffectTracking, Ordering, Reducer, ResultWatchers,
        RwLock, StoreConfig, StoreError, WatchGuard,
    };
    use futures::future::Abortable;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Reducer calls are serialised by the state write lock, so state is only
    /// ever mutated by one action at a time. Effects run concurrently on the
    /// tokio runtime and the actions they produce are dispatched back through
    /// the same lock, even after shutdown has started.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        cancellations: Arc<CancellationRegistry>,
        /// Callers waiting for actions produced by effects
        watchers: Arc<ResultWatchers<A>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default()`].
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                cancellations: Arc::new(CancellationRegistry::default()),
                watchers: Arc::new(ResultWatchers::default()),
            }
        }

        /// Environment this store was built with
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Number of effects currently running in this store
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new actions), then waits for
        /// pending effects to complete. Actions those effects produce are
        /// still reduced. `None` uses the configured default timeout.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), StoreError> {
            let timeout = timeout.unwrap_or(self.config.default_shutdown_timeout);
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(50);

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
        /// 3. Starts the returned effects asynchronously
        /// 4. Effects may produce more actions (feedback loop)
        ///
        /// `send()` returns after starting effect execution, not completion.
        /// Use the returned [`EffectHandle`] to wait for completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            Ok(self.dispatch(action).await)
        }

        /// Run the reducer for `action` and start its effects
        ///
        /// Unlike [`send`](Self::send) this ignores the shutdown flag, so
        /// results of effects already in flight are always applied.
        async fn dispatch(&self, action: A) -> EffectHandle
        where
            R: Clone,
            E: Clone,
        {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            handle
        }

        /// Send an action and collect the matching actions its effects produce
        ///
        /// Registers a watcher before sending, waits until every effect of
        /// `action` has completed, then returns the produced actions accepted
        /// by `predicate` in the order they were dispatched. Every matching
        /// action is kept, however many the effects produce.
        ///
        /// Actions produced by unrelated, concurrently running effects are
        /// offered to the predicate too; it is expected to filter them out
        /// (for example by correlation id).
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send_and_collect<F>(
            &self,
            action: A,
            predicate: F,
        ) -> Result<Vec<A>, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool + Send + Sync + 'static,
        {
            // Watch BEFORE sending to avoid missing fast effects
            let (id, mut rx) = self.watchers.register(Box::new(predicate));
            let _guard = WatchGuard {
                watchers: Arc::clone(&self.watchers),
                id,
            };

            let mut handle = self.send(action).await?;
            handle.wait().await;

            let mut matched = Vec::new();
            while let Ok(action) = rx.try_recv() {
                matched.push(action);
            }

            Ok(matched)
        }

        /// Send an action and return the first matching action its effects produce
        ///
        /// Designed for request-response style calls: the action starts a
        /// remote operation and the predicate recognises its terminal result.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        /// - [`StoreError::NoMatchingAction`]: Effects finished without a match
        pub async fn send_and_wait_for<F>(&self, action: A, predicate: F) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool + Send + Sync + 'static,
        {
            self.send_and_collect(action, predicate)
                .await?
                .into_iter()
                .next()
                .ok_or(StoreError::NoMatchingAction)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Dispatch an action produced by an effect
        ///
        /// Hands it to the watchers, then feeds it back into the reducer. The
        /// reducer pass finishes before the producing effect is counted as
        /// done, so a caller woken by its handle sees the applied state.
        async fn feed_back(&self, action: A)
        where
            R: Clone,
            E: Clone,
        {
            self.watchers.notify(&action);
            self.dispatch(action).await;
        }

        /// Start a spawned, tracked effect task
        fn spawn_tracked<F>(&self, tracking: &EffectTracking, task: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);

            let guard = DecrementGuard(tracking.clone());
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                task.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Delay`: Waits for duration, then sends action
        /// - `Parallel`: Executes effects concurrently
        /// - `Cancellable`: Aborts the effect running under the same id, then
        ///   runs the wrapped tree as one abortable task
        /// - `Cancel`: Aborts the effect running under the id
        ///
        /// Effect failures never halt the store. If an effect task panics it is
        /// logged by tokio; the guards still release its tracking slot.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned per spawned task
        #[tracing::instrument(skip(self, effect, tracking), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);

                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);

                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Cancellable { id, effect } => {
                    tracing::trace!(effect_id = %id, "Executing Effect::Cancellable");
                    metrics::counter!("store.effects.executed", "type" => "cancellable")
                        .increment(1);

                    let (ticket, registration) = self.cancellations.register(id);
                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        match Abortable::new(effect.into_future(), registration).await {
                            Ok(actions) => {
                                store.cancellations.finish(id, ticket);
                                for action in actions {
                                    store.feed_back(action).await;
                                }
                            },
                            Err(_aborted) => {
                                tracing::trace!(effect_id = %id, "Cancellable effect aborted");
                            },
                        }
                    });
                },
                Effect::Cancel(id) => {
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    let cancelled = self.cancellations.cancel(id);
                    tracing::trace!(effect_id = %id, cancelled, "Executing Effect::Cancel");
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                cancellations: Arc::clone(&self.cancellations),
                watchers: Arc::clone(&self.watchers),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
