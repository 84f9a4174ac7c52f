//! # Tasklist Testing
//!
//! Testing utilities and helpers for the tasklist client.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`assertions`]: Assertion helpers for effect descriptions
//! - [`helpers`]: Running effect descriptions without a store
//!
//! ## Example
//!
//! ```ignore
//! use tasklist_testing::{assertions, ReducerTest};
//!
//! #[test]
//! fn load_issues_one_request() {
//!     ReducerTest::new(TodoReducer::new())
//!         .with_env(test_environment())
//!         .given_state(TodoState::new())
//!         .when_action(TodoAction::Load)
//!         .then_effects(|effects| assert_eq!(assertions::count_futures(effects), 1))
//!         .run();
//! }
//! ```

mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

/// Test helpers and utilities
pub mod helpers {
    use tasklist_core::effect::Effect;

    /// Run effect descriptions to completion and return the actions they produce
    ///
    /// The effects run concurrently, as the store would run them, but the
    /// produced actions are returned instead of being fed back into a reducer.
    /// This lets reducer tests assert on the outcome of a described request.
    pub async fn drain_effects<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        futures::future::join_all(effects.into_iter().map(Effect::into_future))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::helpers::drain_effects;
    use tasklist_core::effect::Effect;

    #[tokio::test]
    async fn test_drain_effects_collects_produced_actions() {
        let effects = vec![
            Effect::Future(Box::pin(async { Some(1_u32) })),
            Effect::None,
            Effect::merge(vec![
                Effect::Future(Box::pin(async { Some(2_u32) })),
                Effect::Future(Box::pin(async { Some(3_u32) })),
            ]),
        ];

        assert_eq!(drain_effects(effects).await, vec![1, 2, 3]);
    }
}
