//! In-memory remote store for tests
//!
//! [`InMemoryTodoApi`] behaves like the remote todo store: it assigns ids,
//! keeps todos in insertion order and answers 404 for unknown ids. Tests can
//! additionally make operations fail, hold requests in flight with
//! [`pause`](InMemoryTodoApi::pause) and inspect which calls were made.

use crate::client::{ApiFuture, TodoApi};
use crate::error::ApiError;
use crate::types::{Todo, TodoId, UserId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Remote store operation, for failure injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list`
    List,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// A call received by [`InMemoryTodoApi`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiCall {
    /// `list(user_id)`
    List(UserId),
    /// `create(user_id, title)`
    Create {
        /// Owner
        user_id: UserId,
        /// Title as sent
        title: String,
    },
    /// `update(todo)`
    Update(Todo),
    /// `delete(id)`
    Delete(TodoId),
}

impl ApiCall {
    /// Operation this call invoked
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::List(_) => Operation::List,
            Self::Create { .. } => Operation::Create,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }
}

#[derive(Debug)]
struct Inner {
    todos: Vec<Todo>,
    next_id: u64,
    /// `(operation, None)` fails every call, `(operation, Some(id))` only that id
    failures: HashSet<(Operation, Option<TodoId>)>,
    calls: Vec<ApiCall>,
}

impl Inner {
    fn should_fail(&self, operation: Operation, id: Option<TodoId>) -> bool {
        self.failures.contains(&(operation, None))
            || id.is_some_and(|id| self.failures.contains(&(operation, Some(id))))
    }
}

/// In-memory [`TodoApi`] for tests
///
/// Clones share the same store.
///
/// # Example
///
/// ```
/// use tasklist::mocks::{InMemoryTodoApi, Operation};
/// use tasklist::client::TodoApi;
/// use tasklist::types::UserId;
///
/// # async fn example() {
/// let api = InMemoryTodoApi::new().with_next_id(42);
///
/// let todo = api.create(UserId::new(2272), "Buy milk".to_string()).await.unwrap();
/// assert_eq!(todo.id.get(), 42);
///
/// api.fail(Operation::List);
/// assert!(api.list(UserId::new(2272)).await.is_err());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryTodoApi {
    inner: Arc<Mutex<Inner>>,
    paused: Arc<watch::Sender<bool>>,
    call_count: Arc<watch::Sender<usize>>,
}

impl InMemoryTodoApi {
    /// Create an empty store; ids are assigned from 1
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                todos: Vec::new(),
                next_id: 1,
                failures: HashSet::new(),
                calls: Vec::new(),
            })),
            paused: Arc::new(watch::Sender::new(false)),
            call_count: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Seed the store with `todos`
    ///
    /// Ids assigned by later creates continue after the largest seeded id.
    #[must_use]
    pub fn with_todos(self, todos: Vec<Todo>) -> Self {
        {
            let mut inner = self.lock();
            let max_id = todos.iter().map(|todo| todo.id.get()).max().unwrap_or(0);
            inner.next_id = inner.next_id.max(max_id + 1);
            inner.todos = todos;
        }
        self
    }

    /// Set the id the next create assigns
    #[must_use]
    pub fn with_next_id(self, next_id: u64) -> Self {
        self.lock().next_id = next_id;
        self
    }

    /// Make every call of `operation` fail
    pub fn fail(&self, operation: Operation) {
        self.lock().failures.insert((operation, None));
    }

    /// Make calls of `operation` on `id` fail
    pub fn fail_id(&self, operation: Operation, id: TodoId) {
        self.lock().failures.insert((operation, Some(id)));
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Hold every call after it has been recorded, until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Let held and future calls proceed
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Calls received so far, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of calls of `operation` received so far
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Wait until at least `count` calls have been received
    pub async fn wait_for_calls(&self, count: usize) {
        let mut calls = self.call_count.subscribe();
        let _ = calls.wait_for(|received| *received >= count).await;
    }

    /// Todos currently stored
    #[must_use]
    pub fn todos(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call`, then wait while the store is paused
    async fn receive(&self, call: ApiCall) {
        let received = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.calls.len()
        };
        self.call_count.send_replace(received);

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;
    }

    fn injected_failure(operation: Operation) -> ApiError {
        ApiError::Status {
            status: 500,
            message: format!("injected {operation:?} failure"),
        }
    }

    fn not_found(id: TodoId) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("todo {id} not found"),
        }
    }
}

impl Default for InMemoryTodoApi {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoApi for InMemoryTodoApi {
    fn list(&self, user_id: UserId) -> ApiFuture<'_, Vec<Todo>> {
        Box::pin(async move {
            self.receive(ApiCall::List(user_id)).await;

            let inner = self.lock();
            if inner.should_fail(Operation::List, None) {
                return Err(Self::injected_failure(Operation::List));
            }
            Ok(inner
                .todos
                .iter()
                .filter(|todo| todo.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn create(&self, user_id: UserId, title: String) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            self.receive(ApiCall::Create {
                user_id,
                title: title.clone(),
            })
            .await;

            let mut inner = self.lock();
            if inner.should_fail(Operation::Create, None) {
                return Err(Self::injected_failure(Operation::Create));
            }

            let todo = Todo {
                id: TodoId::new(inner.next_id),
                user_id,
                title,
                completed: false,
            };
            inner.next_id += 1;
            inner.todos.push(todo.clone());
            Ok(todo)
        })
    }

    fn update(&self, todo: Todo) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            self.receive(ApiCall::Update(todo.clone())).await;

            let mut inner = self.lock();
            if inner.should_fail(Operation::Update, Some(todo.id)) {
                return Err(Self::injected_failure(Operation::Update));
            }

            let Some(stored) = inner.todos.iter_mut().find(|stored| stored.id == todo.id) else {
                return Err(Self::not_found(todo.id));
            };
            *stored = todo.clone();
            Ok(todo)
        })
    }

    fn delete(&self, id: TodoId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.receive(ApiCall::Delete(id)).await;

            let mut inner = self.lock();
            if inner.should_fail(Operation::Delete, Some(id)) {
                return Err(Self::injected_failure(Operation::Delete));
            }

            let before = inner.todos.len();
            inner.todos.retain(|todo| todo.id != id);
            if inner.todos.len() == before {
                return Err(Self::not_found(id));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: u64, title: &str) -> Todo {
        Todo {
            id: TodoId::new(id),
            user_id: UserId::new(2272),
            title: title.to_string(),
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_after_seeded_todos() {
        let api = InMemoryTodoApi::new().with_todos(vec![todo(5, "A")]);

        let created = api.create(UserId::new(2272), "B".to_string()).await.unwrap();
        assert_eq!(created.id, TodoId::new(6));
        assert_eq!(api.todos().len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_user() {
        let mut other = todo(2, "B");
        other.user_id = UserId::new(1);
        let api = InMemoryTodoApi::new().with_todos(vec![todo(1, "A"), other]);

        let todos = api.list(UserId::new(2272)).await.unwrap();
        assert_eq!(todos, vec![todo(1, "A")]);
    }

    #[tokio::test]
    async fn test_failure_for_one_id() {
        let api = InMemoryTodoApi::new().with_todos(vec![todo(1, "A"), todo(2, "B")]);
        api.fail_id(Operation::Delete, TodoId::new(1));

        assert!(api.delete(TodoId::new(1)).await.is_err());
        assert!(api.delete(TodoId::new(2)).await.is_ok());
        assert_eq!(api.count(Operation::Delete), 2);

        api.clear_failures();
        assert!(api.delete(TodoId::new(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let api = InMemoryTodoApi::new();

        let result = api.update(todo(9, "X")).await;
        assert!(matches!(result, Err(ApiError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_pause_holds_recorded_call() {
        let api = InMemoryTodoApi::new();
        api.pause();

        let task = tokio::spawn({
            let api = api.clone();
            async move { api.create(UserId::new(2272), "A".to_string()).await }
        });

        api.wait_for_calls(1).await;
        assert!(api.todos().is_empty());
        assert!(!task.is_finished());

        api.resume();
        let created = task.await.unwrap().unwrap();
        assert_eq!(api.todos(), vec![created]);
    }
}
