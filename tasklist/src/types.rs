//! Domain types for the tasklist client.
//!
//! The state mirrors what the todo screen renders: the persisted collection in
//! server order, the in-flight todo being created, which ids have requests in
//! flight, the active filter and the current error notification.

use crate::error::{ParseFilterError, TodoError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Identifier of a todo, assigned by the remote store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(u64);

impl TodoId {
    /// Id of a todo that has not been persisted yet
    pub const PENDING: Self = Self(0);

    /// Creates a `TodoId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this id marks a not-yet-persisted todo
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner of a todo; fixed for the whole session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Creates a `UserId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo, in its wire representation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Server-assigned identifier (`TodoId::PENDING` while creating)
    pub id: TodoId,
    /// Owner
    pub user_id: UserId,
    /// Title, trimmed before it is sent anywhere
    pub title: String,
    /// Whether the todo is done
    pub completed: bool,
}

impl Todo {
    /// Creates the placeholder shown while a create request is in flight
    #[must_use]
    pub fn pending(user_id: UserId, title: impl Into<String>) -> Self {
        Self {
            id: TodoId::PENDING,
            user_id,
            title: title.into(),
            completed: false,
        }
    }

    /// Returns a copy with another title
    #[must_use]
    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with another completion flag
    #[must_use]
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    /// Returns a copy with the completion flag flipped
    #[must_use]
    pub fn toggled(&self) -> Self {
        self.with_completed(!self.completed)
    }
}

/// Which todos the list shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Every todo
    #[default]
    All,
    /// Todos not completed yet
    Active,
    /// Completed todos
    Completed,
}

impl Filter {
    /// All filters, in the order the filter links are shown
    pub const ALL: [Self; 3] = [Self::All, Self::Active, Self::Completed];

    /// Whether `todo` is shown under this filter
    #[must_use]
    pub const fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => !todo.completed,
            Self::Completed => todo.completed,
        }
    }

    /// URL fragment of the filter link (`#/all`, `#/active`, `#/completed`)
    #[must_use]
    pub const fn fragment(self) -> &'static str {
        match self {
            Self::All => "#/all",
            Self::Active => "#/active",
            Self::Completed => "#/completed",
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::All => "All",
            Self::Active => "Active",
            Self::Completed => "Completed",
        })
    }
}

impl FromStr for Filter {
    type Err = ParseFilterError;

    /// Accepts the bare names and the link fragments, case-insensitively.
    /// An empty route (`""`, `#`, `#/`) is `All`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let route = s.trim();
        let route = route.strip_prefix('#').unwrap_or(route);
        let route = route.strip_prefix('/').unwrap_or(route);

        match route.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseFilterError(s.to_string())),
        }
    }
}

/// Correlates a command with the result action its request produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a `RequestId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// State of the todo screen
///
/// `items` only ever holds persisted todos. The todo being created lives in
/// `pending_todo` and is never merged into `items`; the server's copy is
/// appended when the create succeeds.
#[derive(Clone, Debug, Default)]
pub struct TodoState {
    /// Persisted todos in server order, new ones appended at the end
    pub items: Vec<Todo>,
    /// Placeholder for the todo being created
    pub pending_todo: Option<Todo>,
    /// Current error notification
    pub error: Option<TodoError>,
    /// Bumped on every error change; stale dismissal timers carry an old value
    pub error_generation: u64,
    /// Active filter
    pub filter: Filter,
    creating: usize,
    pending_ids: HashMap<TodoId, usize>,
}

impl TodoState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state holding `items`
    #[must_use]
    pub fn with_items(items: Vec<Todo>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Whether a create request is in flight
    #[must_use]
    pub const fn is_creating(&self) -> bool {
        self.creating > 0
    }

    /// Whether an update or delete request for `id` is in flight
    #[must_use]
    pub fn is_pending(&self, id: TodoId) -> bool {
        self.pending_ids.contains_key(&id)
    }

    /// Ids with an update or delete request in flight
    pub fn pending_ids(&self) -> impl Iterator<Item = TodoId> + '_ {
        self.pending_ids.keys().copied()
    }

    /// Whether the row for `id` shows its loader
    ///
    /// The placeholder row (`TodoId::PENDING`) loads while it is being created.
    #[must_use]
    pub fn is_loading(&self, id: TodoId) -> bool {
        if id.is_pending() {
            self.is_creating()
        } else {
            self.is_pending(id)
        }
    }

    /// Returns a todo by ID
    #[must_use]
    pub fn get(&self, id: TodoId) -> Option<&Todo> {
        self.items.iter().find(|todo| todo.id == id)
    }

    /// Returns the number of todos
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty (the footer and toggle-all are hidden)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Todos not completed yet, in collection order
    #[must_use]
    pub fn uncompleted(&self) -> Vec<&Todo> {
        self.filtered(Filter::Active)
    }

    /// Completed todos, in collection order
    #[must_use]
    pub fn completed(&self) -> Vec<&Todo> {
        self.filtered(Filter::Completed)
    }

    /// Whether every todo is completed (vacuously true when empty)
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.items.iter().all(|todo| todo.completed)
    }

    /// Todos matching `filter`, preserving collection order
    #[must_use]
    pub fn filtered(&self, filter: Filter) -> Vec<&Todo> {
        self.items.iter().filter(|todo| filter.matches(todo)).collect()
    }

    /// Rows to render: the filtered todos followed by the placeholder
    #[must_use]
    pub fn visible(&self) -> Vec<&Todo> {
        let mut rows = self.filtered(self.filter);
        rows.extend(self.pending_todo.as_ref());
        rows
    }

    /// Number of todos left to do ("N items left")
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|todo| !todo.completed).count()
    }

    /// Returns the number of completed todos
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|todo| todo.completed).count()
    }

    /// Whether "Clear completed" has anything to clear
    #[must_use]
    pub fn has_completed(&self) -> bool {
        self.items.iter().any(|todo| todo.completed)
    }

    pub(crate) fn begin_create(&mut self, placeholder: Todo) {
        self.creating += 1;
        self.pending_todo = Some(placeholder);
    }

    pub(crate) fn end_create(&mut self) {
        self.creating = self.creating.saturating_sub(1);
        if self.creating == 0 {
            self.pending_todo = None;
        }
    }

    pub(crate) fn begin_request(&mut self, id: TodoId) {
        *self.pending_ids.entry(id).or_insert(0) += 1;
    }

    pub(crate) fn end_request(&mut self, id: TodoId) {
        if let Some(count) = self.pending_ids.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.pending_ids.remove(&id);
            }
        }
    }

    /// Replaces the todo with the same id; a todo deleted meanwhile stays gone
    pub(crate) fn replace(&mut self, todo: Todo) {
        if let Some(slot) = self.items.iter_mut().find(|item| item.id == todo.id) {
            *slot = todo;
        }
    }

    pub(crate) fn remove(&mut self, id: TodoId) {
        self.items.retain(|todo| todo.id != id);
    }
}

/// Actions for the todo screen
///
/// Commands carry the user's intent; result actions are produced by the
/// effects that perform the remote calls and are fed back into the reducer.
/// Every command that issues a request carries a [`RequestId`] which its
/// result actions echo.
#[derive(Clone, Debug, PartialEq)]
pub enum TodoAction {
    // ========== Commands ==========
    /// Command: Fetch the user's todos
    Load,

    /// Command: Create a todo
    Add {
        /// Correlation id
        request: RequestId,
        /// Title as typed
        title: String,
    },

    /// Command: Send the full todo to the server
    Update {
        /// Correlation id
        request: RequestId,
        /// The todo as it should be stored
        todo: Todo,
    },

    /// Command: Delete a todo
    Delete {
        /// Correlation id
        request: RequestId,
        /// Todo to delete
        id: TodoId,
    },

    /// Command: Complete every todo, or reopen all when all are complete
    ToggleAll {
        /// Correlation id shared by every update in the batch
        request: RequestId,
    },

    /// Command: Delete every completed todo
    ClearCompleted {
        /// Correlation id shared by every delete in the batch
        request: RequestId,
    },

    /// Command: Commit an edited title
    EditTitle {
        /// Correlation id
        request: RequestId,
        /// The todo being edited
        todo: Todo,
        /// Title as typed
        title: String,
    },

    /// Command: Flip a todo's completion flag
    ToggleStatus {
        /// Correlation id
        request: RequestId,
        /// The todo to flip
        todo: Todo,
    },

    /// Command: Change the visible filter
    SetFilter {
        /// New filter
        filter: Filter,
    },

    /// Command: Hide the error notification
    DismissError,

    // ========== Results ==========
    /// Result: The list fetch succeeded
    Loaded {
        /// Todos in server order
        todos: Vec<Todo>,
    },

    /// Result: The list fetch failed
    LoadFailed {
        /// Transport error
        reason: String,
    },

    /// Result: The server created a todo
    Created {
        /// Correlation id
        request: RequestId,
        /// The todo with its assigned id
        todo: Todo,
    },

    /// Result: The create request failed
    AddFailed {
        /// Correlation id
        request: RequestId,
        /// Transport error
        reason: String,
    },

    /// Result: The title was blank, no request was sent
    AddRejected {
        /// Correlation id
        request: RequestId,
    },

    /// Result: The server stored an update
    Updated {
        /// Correlation id
        request: RequestId,
        /// The todo that was updated
        id: TodoId,
        /// Canonical todo returned by the server
        todo: Todo,
    },

    /// Result: The update request failed
    UpdateFailed {
        /// Correlation id
        request: RequestId,
        /// The todo that was not updated
        id: TodoId,
        /// Transport error
        reason: String,
    },

    /// Result: The server deleted a todo
    Deleted {
        /// Correlation id
        request: RequestId,
        /// The deleted todo
        id: TodoId,
    },

    /// Result: The delete request failed
    DeleteFailed {
        /// Correlation id
        request: RequestId,
        /// The todo that was not deleted
        id: TodoId,
        /// Transport error
        reason: String,
    },

    /// Result: The edited title equals the current one, nothing was sent
    EditSkipped {
        /// Correlation id
        request: RequestId,
    },

    /// Timer: The error notification's display time is over
    ErrorExpired {
        /// Generation of the error the timer was started for
        generation: u64,
    },
}

impl TodoAction {
    /// Correlation id of a result action
    #[must_use]
    pub const fn result_of(&self) -> Option<RequestId> {
        match self {
            Self::Created { request, .. }
            | Self::AddFailed { request, .. }
            | Self::AddRejected { request }
            | Self::Updated { request, .. }
            | Self::UpdateFailed { request, .. }
            | Self::Deleted { request, .. }
            | Self::DeleteFailed { request, .. }
            | Self::EditSkipped { request } => Some(*request),
            _ => None,
        }
    }

    /// Whether this action reports the outcome of the initial list fetch
    #[must_use]
    pub const fn is_load_result(&self) -> bool {
        matches!(self, Self::Loaded { .. } | Self::LoadFailed { .. })
    }
}

/// Per-member results of a batch operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Todos whose request succeeded
    pub succeeded: Vec<TodoId>,
    /// Todos whose request failed
    pub failed: Vec<TodoId>,
}

impl BatchOutcome {
    /// Whether no member failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of requests the batch issued
    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether the batch issued no request
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What committing an edited title did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// The title did not change; nothing was sent
    Unchanged,
    /// The new title was stored
    Updated,
    /// The title was blank, so the todo was deleted
    Deleted,
    /// The update or delete request failed
    Failed,
}

impl EditOutcome {
    /// Whether the edit can be closed
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}
