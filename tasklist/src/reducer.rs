//! Reducer for the todo screen.
//!
//! Commands mark the affected todos as in flight and describe the remote call
//! as an [`Effect::Future`]. The call's outcome comes back as a result action
//! which applies the change, clears the in-flight marker and, on failure,
//! raises the error notification. Every command that issues a request is
//! therefore balanced by exactly one result action per request.

use crate::client::TodoApi;
use crate::error::TodoError;
use crate::types::{RequestId, Todo, TodoAction, TodoId, TodoState, UserId};
use std::sync::Arc;
use std::time::Duration;
use tasklist_core::effect::{Effect, EffectId};
use tasklist_core::reducer::Reducer;
use tasklist_core::{smallvec, SmallVec};

/// Identity of the error notification's dismissal timer
pub const ERROR_DISMISS: EffectId = EffectId::new("todo.error_dismiss");

/// How long an error stays visible unless dismissed, in milliseconds
pub const DEFAULT_ERROR_DISPLAY_MS: u64 = 3000;

/// How long an error stays visible unless dismissed
pub const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_millis(DEFAULT_ERROR_DISPLAY_MS);

/// Environment dependencies for the todo reducer
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Remote todo store
    pub api: Arc<dyn TodoApi>,
    /// Owner of every todo created in this session
    pub user_id: UserId,
    /// How long an error stays visible
    pub error_display: Duration,
}

impl TodoEnvironment {
    /// Creates a new `TodoEnvironment`
    #[must_use]
    pub fn new(api: Arc<dyn TodoApi>, user_id: UserId) -> Self {
        Self {
            api,
            user_id,
            error_display: DEFAULT_ERROR_DISPLAY,
        }
    }

    /// Sets how long an error stays visible
    #[must_use]
    pub const fn with_error_display(mut self, error_display: Duration) -> Self {
        self.error_display = error_display;
        self
    }
}

impl std::fmt::Debug for TodoEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoEnvironment")
            .field("user_id", &self.user_id)
            .field("error_display", &self.error_display)
            .finish_non_exhaustive()
    }
}

/// Reducer for the todo screen
#[derive(Clone, Debug)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Shows `error`, replacing the current one, and restarts the dismissal timer
    ///
    /// The timer is registered under [`ERROR_DISMISS`], so starting it aborts
    /// the timer of the error being replaced.
    fn set_error(
        state: &mut TodoState,
        error: TodoError,
        env: &TodoEnvironment,
    ) -> Effect<TodoAction> {
        state.error_generation += 1;
        state.error = Some(error);

        Effect::cancellable(
            ERROR_DISMISS,
            Effect::Delay {
                duration: env.error_display,
                action: Box::new(TodoAction::ErrorExpired {
                    generation: state.error_generation,
                }),
            },
        )
    }

    /// Describes the update request for `todo`
    fn update_effect(env: &TodoEnvironment, request: RequestId, todo: Todo) -> Effect<TodoAction> {
        let api = Arc::clone(&env.api);
        let id = todo.id;

        Effect::Future(Box::pin(async move {
            match api.update(todo).await {
                Ok(todo) => {
                    tracing::info!(todo_id = %id, completed = todo.completed, "Todo updated");
                    Some(TodoAction::Updated { request, id, todo })
                },
                Err(error) => {
                    tracing::warn!(todo_id = %id, error = %error, "Failed to update todo");
                    Some(TodoAction::UpdateFailed {
                        request,
                        id,
                        reason: error.to_string(),
                    })
                },
            }
        }))
    }

    /// Describes the delete request for `id`
    fn delete_effect(env: &TodoEnvironment, request: RequestId, id: TodoId) -> Effect<TodoAction> {
        let api = Arc::clone(&env.api);

        Effect::Future(Box::pin(async move {
            match api.delete(id).await {
                Ok(()) => {
                    tracing::info!(todo_id = %id, "Todo deleted");
                    Some(TodoAction::Deleted { request, id })
                },
                Err(error) => {
                    tracing::warn!(todo_id = %id, error = %error, "Failed to delete todo");
                    Some(TodoAction::DeleteFailed {
                        request,
                        id,
                        reason: error.to_string(),
                    })
                },
            }
        }))
    }

    /// Marks `todo` in flight and describes its update
    fn begin_update(
        state: &mut TodoState,
        env: &TodoEnvironment,
        request: RequestId,
        todo: Todo,
    ) -> Effect<TodoAction> {
        let todo = Todo {
            title: todo.title.trim().to_string(),
            ..todo
        };
        state.begin_request(todo.id);
        Self::update_effect(env, request, todo)
    }

    /// Marks `id` in flight and describes its deletion
    fn begin_delete(
        state: &mut TodoState,
        env: &TodoEnvironment,
        request: RequestId,
        id: TodoId,
    ) -> Effect<TodoAction> {
        state.begin_request(id);
        Self::delete_effect(env, request, id)
    }

    /// Resolves to `action` without doing any work
    ///
    /// Used for commands that finish without a request, so that callers
    /// waiting for a result action still get one.
    fn ready(action: TodoAction) -> Effect<TodoAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }
}

impl Default for TodoReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for TodoReducer {
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            TodoAction::Load => {
                let api = Arc::clone(&env.api);
                let user_id = env.user_id;

                smallvec![Effect::Future(Box::pin(async move {
                    match api.list(user_id).await {
                        Ok(todos) => {
                            tracing::info!(user_id = %user_id, count = todos.len(), "Todos loaded");
                            Some(TodoAction::Loaded { todos })
                        },
                        Err(error) => {
                            tracing::warn!(user_id = %user_id, error = %error, "Failed to load todos");
                            Some(TodoAction::LoadFailed {
                                reason: error.to_string(),
                            })
                        },
                    }
                }))]
            },

            TodoAction::Add { request, title } => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return smallvec![Self::ready(TodoAction::AddRejected { request })];
                }

                state.begin_create(Todo::pending(env.user_id, title.clone()));

                let api = Arc::clone(&env.api);
                let user_id = env.user_id;
                smallvec![Effect::Future(Box::pin(async move {
                    match api.create(user_id, title).await {
                        Ok(todo) => {
                            tracing::info!(todo_id = %todo.id, "Todo created");
                            Some(TodoAction::Created { request, todo })
                        },
                        Err(error) => {
                            tracing::warn!(error = %error, "Failed to create todo");
                            Some(TodoAction::AddFailed {
                                request,
                                reason: error.to_string(),
                            })
                        },
                    }
                }))]
            },

            TodoAction::Update { request, todo } => {
                smallvec![Self::begin_update(state, env, request, todo)]
            },

            TodoAction::Delete { request, id } => {
                smallvec![Self::begin_delete(state, env, request, id)]
            },

            TodoAction::ToggleAll { request } => {
                // Complete the remaining ones, or reopen everything
                let targets: Vec<Todo> = if state.all_completed() {
                    state.items.iter().map(|todo| todo.with_completed(false)).collect()
                } else {
                    state
                        .uncompleted()
                        .into_iter()
                        .map(|todo| todo.with_completed(true))
                        .collect()
                };

                tracing::debug!(count = targets.len(), "Toggling all todos");

                let updates = targets
                    .into_iter()
                    .map(|todo| Self::begin_update(state, env, request, todo))
                    .collect();
                smallvec![Effect::merge(updates)]
            },

            TodoAction::ClearCompleted { request } => {
                let ids: Vec<TodoId> = state.completed().iter().map(|todo| todo.id).collect();

                tracing::debug!(count = ids.len(), "Clearing completed todos");

                let deletes = ids
                    .into_iter()
                    .map(|id| Self::begin_delete(state, env, request, id))
                    .collect();
                smallvec![Effect::merge(deletes)]
            },

            TodoAction::EditTitle {
                request,
                todo,
                title,
            } => {
                let title = title.trim();

                if title == todo.title {
                    smallvec![Self::ready(TodoAction::EditSkipped { request })]
                } else if title.is_empty() {
                    smallvec![Self::begin_delete(state, env, request, todo.id)]
                } else {
                    let todo = todo.with_title(title);
                    smallvec![Self::begin_update(state, env, request, todo)]
                }
            },

            TodoAction::ToggleStatus { request, todo } => {
                smallvec![Self::begin_update(state, env, request, todo.toggled())]
            },

            TodoAction::SetFilter { filter } => {
                state.filter = filter;
                SmallVec::new()
            },

            TodoAction::DismissError => {
                state.error = None;
                state.error_generation += 1;
                smallvec![Effect::Cancel(ERROR_DISMISS)]
            },

            // ========== Results ==========
            TodoAction::Loaded { todos } => {
                state.items = todos;
                SmallVec::new()
            },

            TodoAction::LoadFailed { .. } => {
                smallvec![Self::set_error(state, TodoError::LoadFailed, env)]
            },

            TodoAction::Created { todo, .. } => {
                state.end_create();
                state.items.push(todo);
                SmallVec::new()
            },

            TodoAction::AddFailed { .. } => {
                state.end_create();
                smallvec![Self::set_error(state, TodoError::AddFailed, env)]
            },

            TodoAction::AddRejected { .. } => {
                smallvec![Self::set_error(state, TodoError::EmptyTitle, env)]
            },

            TodoAction::Updated { id, todo, .. } => {
                state.end_request(id);
                state.replace(todo);
                SmallVec::new()
            },

            TodoAction::UpdateFailed { id, .. } => {
                state.end_request(id);
                smallvec![Self::set_error(state, TodoError::UpdateFailed, env)]
            },

            TodoAction::Deleted { id, .. } => {
                state.end_request(id);
                state.remove(id);
                SmallVec::new()
            },

            TodoAction::DeleteFailed { id, .. } => {
                state.end_request(id);
                smallvec![Self::set_error(state, TodoError::DeleteFailed, env)]
            },

            TodoAction::EditSkipped { .. } => SmallVec::new(),

            TodoAction::ErrorExpired { generation } => {
                // A timer outliving its error must not hide the next one
                if generation == state.error_generation {
                    state.error = None;
                }
                SmallVec::new()
            },
        }
    }
}
