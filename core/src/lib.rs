//! # Tasklist Core
//!
//! Core traits and types for the tasklist client.
//!
//! The client keeps its todo collection in a single state value that is only
//! ever changed by a reducer. Network calls, timers and other side effects are
//! never performed by the reducer itself: it returns [`Effect`](effect::Effect)
//! descriptions which the runtime executes, feeding any resulting action back
//! into the reducer.
//!
//! ## Core Concepts
//!
//! - **State**: Everything the UI renders (collection, in-flight markers, error)
//! - **Action**: User intents and the results of remote calls
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies (remote store client, user id, timings)
//!
//! ## Example
//!
//! ```
//! use tasklist_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Increment => {
//!                 state.count += 1;
//!                 smallvec![Effect::None]
//!             },
//!         }
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! let effects = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
//! assert_eq!(state.count, 1);
//! assert!(effects[0].is_none());
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

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
        /// Most actions produce zero to two effects, hence the inline
        /// capacity of four.
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
/// They are values (not execution) and are composable and cancellable.
pub mod effect {
    use futures::future::{BoxFuture, FutureExt};
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identity of a cancellable effect
    ///
    /// At most one effect per id is alive in a store at any time: starting a
    /// new [`Effect::Cancellable`] with an id aborts the previous one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EffectId(&'static str);

    impl EffectId {
        /// Create an effect id from a static name
        #[must_use]
        pub const fn new(name: &'static str) -> Self {
            Self(name)
        }

        /// Name of this effect id
        #[must_use]
        pub const fn as_str(&self) -> &'static str {
            self.0
        }
    }

    impl std::fmt::Display for EffectId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, auto-dismissal)
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

        /// Effect that can be cancelled by id
        ///
        /// Starting it aborts whatever effect is still running under the same id.
        Cancellable {
            /// Identity used for replacement and cancellation
            id: EffectId,
            /// The wrapped effect
            effect: Box<Effect<Action>>,
        },

        /// Abort the running effect registered under this id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Wrap an effect so it replaces any running effect with the same id
        #[must_use]
        pub fn cancellable(id: EffectId, effect: Effect<Action>) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(effect),
            }
        }

        /// Whether this is the no-op effect
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }

    impl<Action> Effect<Action>
    where
        Action: Send + 'static,
    {
        /// Collapse this effect tree into a single future
        ///
        /// The future resolves to every action the tree produces, parallel
        /// branches in declaration order. A nested `Cancellable` runs as a plain effect and a nested
        /// `Cancel` is a no-op, since the tree as a whole is the unit of
        /// cancellation.
        #[must_use]
        pub fn into_future(self) -> BoxFuture<'static, Vec<Action>> {
            match self {
                Effect::None | Effect::Cancel(_) => futures::future::ready(Vec::new()).boxed(),
                Effect::Future(fut) => async move { fut.await.into_iter().collect() }.boxed(),
                Effect::Delay { duration, action } => async move {
                    tokio::time::sleep(duration).await;
                    vec![*action]
                }
                .boxed(),
                Effect::Parallel(effects) => async move {
                    futures::future::join_all(effects.into_iter().map(Effect::into_future))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                }
                .boxed(),
                Effect::Cancellable { effect, .. } => effect.into_future(),
            }
        }
    }
}
