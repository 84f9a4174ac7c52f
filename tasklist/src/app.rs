//! Awaitable operations over the todo store
//!
//! [`TodoApp`] wraps a [`Store`] running the [`TodoReducer`]. Each operation
//! sends one command tagged with a fresh [`RequestId`] and waits for the
//! result actions carrying that id, so callers get the outcome of their own
//! request even while other operations are in flight.

use crate::client::{HttpTodoApi, TodoApi};
use crate::config::Config;
use crate::error::AppError;
use crate::reducer::{TodoEnvironment, TodoReducer};
use crate::types::{
    BatchOutcome, EditOutcome, Filter, RequestId, Todo, TodoAction, TodoId, TodoState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasklist_runtime::{EffectHandle, Store, StoreConfig};

/// Store type driving the todo screen
pub type TodoStore = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

/// The todo screen's controller
///
/// Clones share the same store.
#[derive(Clone)]
pub struct TodoApp {
    store: TodoStore,
    next_request: Arc<AtomicU64>,
}

impl TodoApp {
    /// Create a controller with an empty collection
    #[must_use]
    pub fn new(environment: TodoEnvironment) -> Self {
        Self::with_store_config(environment, StoreConfig::default())
    }

    /// Create a controller with custom store settings
    #[must_use]
    pub fn with_store_config(environment: TodoEnvironment, config: StoreConfig) -> Self {
        Self {
            store: Store::with_config(TodoState::new(), TodoReducer::new(), environment, config),
            next_request: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create a controller talking to `api` with the settings in `config`
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `config` is invalid.
    pub fn with_api(api: Arc<dyn TodoApi>, config: &Config) -> Result<Self, AppError> {
        config.validate()?;

        let environment = TodoEnvironment::new(api, config.user())
            .with_error_display(config.error_display());
        Ok(Self::with_store_config(environment, config.store_config()))
    }

    /// Create a controller talking to the HTTP store at `config.api_url`
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `config` is invalid.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::with_api(Arc::new(HttpTodoApi::new(config.api_url.clone())), config)
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &TodoStore {
        &self.store
    }

    fn next_request(&self) -> RequestId {
        RequestId::new(self.next_request.fetch_add(1, Ordering::Relaxed))
    }

    /// Fetch the user's todos, replacing the collection
    ///
    /// Returns `false` if the fetch failed; the error notification then shows
    /// `LoadFailed` and the collection is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<bool, AppError> {
        let result = self
            .store
            .send_and_wait_for(TodoAction::Load, TodoAction::is_load_result)
            .await?;

        Ok(matches!(result, TodoAction::Loaded { .. }))
    }

    /// Create a todo titled `title` (trimmed)
    ///
    /// While the request is in flight the state's `pending_todo` shows the new
    /// todo. Returns `false` if the title is blank (no request is sent) or
    /// the request failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, title: &str) -> Result<bool, AppError> {
        let request = self.next_request();
        let result = self
            .store
            .send_and_wait_for(
                TodoAction::Add {
                    request,
                    title: title.to_string(),
                },
                move |action| action.result_of() == Some(request),
            )
            .await?;

        Ok(matches!(result, TodoAction::Created { .. }))
    }

    /// Store `todo` as given (title trimmed)
    ///
    /// Returns `false` if the request failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self, todo), fields(todo_id = %todo.id))]
    pub async fn update(&self, todo: Todo) -> Result<bool, AppError> {
        let request = self.next_request();
        let result = self
            .store
            .send_and_wait_for(TodoAction::Update { request, todo }, move |action| {
                action.result_of() == Some(request)
            })
            .await?;

        Ok(matches!(result, TodoAction::Updated { .. }))
    }

    /// Delete the todo with `id`
    ///
    /// Returns `false` if the request failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: TodoId) -> Result<bool, AppError> {
        let request = self.next_request();
        let result = self
            .store
            .send_and_wait_for(TodoAction::Delete { request, id }, move |action| {
                action.result_of() == Some(request)
            })
            .await?;

        Ok(matches!(result, TodoAction::Deleted { .. }))
    }

    /// Complete every uncompleted todo, or reopen all of them when all are
    /// completed
    ///
    /// Each todo is updated by its own request; the outcome lists which ones
    /// succeeded once all requests have finished.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_all(&self) -> Result<BatchOutcome, AppError> {
        let request = self.next_request();
        self.run_batch(TodoAction::ToggleAll { request }, request)
            .await
    }

    /// Delete every completed todo, one request per todo
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self))]
    pub async fn clear_completed(&self) -> Result<BatchOutcome, AppError> {
        let request = self.next_request();
        self.run_batch(TodoAction::ClearCompleted { request }, request)
            .await
    }

    async fn run_batch(&self, action: TodoAction, request: RequestId) -> Result<BatchOutcome, AppError> {
        let results = self
            .store
            .send_and_collect(action, move |action| action.result_of() == Some(request))
            .await?;

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                TodoAction::Updated { id, .. } | TodoAction::Deleted { id, .. } => {
                    outcome.succeeded.push(id);
                },
                TodoAction::UpdateFailed { id, .. } | TodoAction::DeleteFailed { id, .. } => {
                    outcome.failed.push(id);
                },
                _ => {},
            }
        }

        tracing::debug!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Batch finished"
        );
        Ok(outcome)
    }

    /// Commit `title` as the new title of `todo`
    ///
    /// The title is trimmed. An unchanged title sends nothing; a blank one
    /// deletes the todo.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self, todo), fields(todo_id = %todo.id))]
    pub async fn edit_title(&self, todo: &Todo, title: &str) -> Result<EditOutcome, AppError> {
        let request = self.next_request();
        let result = self
            .store
            .send_and_wait_for(
                TodoAction::EditTitle {
                    request,
                    todo: todo.clone(),
                    title: title.to_string(),
                },
                move |action| action.result_of() == Some(request),
            )
            .await?;

        Ok(match result {
            TodoAction::EditSkipped { .. } => EditOutcome::Unchanged,
            TodoAction::Updated { .. } => EditOutcome::Updated,
            TodoAction::Deleted { .. } => EditOutcome::Deleted,
            _ => EditOutcome::Failed,
        })
    }

    /// Flip the completion flag of `todo`
    ///
    /// Returns as soon as the request is started. A failure only shows up in
    /// the error notification; wait on the handle to observe completion.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    #[tracing::instrument(skip(self, todo), fields(todo_id = %todo.id))]
    pub async fn toggle_status(&self, todo: &Todo) -> Result<EffectHandle, AppError> {
        let request = self.next_request();
        Ok(self
            .store
            .send(TodoAction::ToggleStatus {
                request,
                todo: todo.clone(),
            })
            .await?)
    }

    /// Show the todos matching `filter`
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    pub async fn set_filter(&self, filter: Filter) -> Result<(), AppError> {
        self.store.send(TodoAction::SetFilter { filter }).await?;
        Ok(())
    }

    /// Hide the error notification now
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store is shutting down.
    pub async fn dismiss_error(&self) -> Result<(), AppError> {
        self.store.send(TodoAction::DismissError).await?;
        Ok(())
    }

    /// Read the current state through `f`
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&TodoState) -> T,
    {
        self.store.state(f).await
    }

    /// A copy of the current state
    pub async fn snapshot(&self) -> TodoState {
        self.store.state(TodoState::clone).await
    }

    /// Stop accepting operations and wait for requests in flight
    ///
    /// Requests already in flight still update the collection. A pending
    /// error dismissal timer counts as in flight, so `timeout` should exceed
    /// the error display time unless the error was dismissed. `None` uses
    /// the configured shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if effects are still running at the timeout.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), AppError> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TodoApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoApp")
            .field("environment", self.store.environment())
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
