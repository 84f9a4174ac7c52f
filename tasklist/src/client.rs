//! Remote todo store access
//!
//! [`TodoApi`] is the seam between the reducer and the network. The
//! production implementation talks JSON over HTTP; tests use the in-memory
//! store from the `mocks` module (`test-utils` feature).

use crate::error::ApiError;
use crate::types::{Todo, TodoId, UserId};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`TodoApi`] methods
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Default base URL of the remote todo store
pub const DEFAULT_API_URL: &str = "https://mate.academy/students-api";

/// CRUD operations of the remote todo store
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the reducer environment can hold an
/// `Arc<dyn TodoApi>`.
pub trait TodoApi: Send + Sync {
    /// Fetch every todo owned by `user_id`, in server order
    fn list(&self, user_id: UserId) -> ApiFuture<'_, Vec<Todo>>;

    /// Create an uncompleted todo and return it with its assigned id
    fn create(&self, user_id: UserId, title: String) -> ApiFuture<'_, Todo>;

    /// Replace the stored todo with `todo` and return the stored version
    fn update(&self, todo: Todo) -> ApiFuture<'_, Todo>;

    /// Delete a todo
    fn delete(&self, id: TodoId) -> ApiFuture<'_, ()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTodo<'a> {
    title: &'a str,
    user_id: UserId,
    completed: bool,
}

/// HTTP client for the remote todo store
#[derive(Clone, Debug)]
pub struct HttpTodoApi {
    client: Client,
    base_url: String,
}

impl HttpTodoApi {
    /// Create a client for the store at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest::Client`
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/todos", self.base_url)
    }

    fn todo_url(&self, id: TodoId) -> String {
        format!("{}/todos/{id}", self.base_url)
    }

    async fn fetch_list(&self, user_id: UserId) -> Result<Vec<Todo>, ApiError> {
        let response = self
            .client
            .get(format!("{}?userId={user_id}", self.collection_url()))
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<Vec<Todo>>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }

    async fn post_todo(&self, user_id: UserId, title: String) -> Result<Todo, ApiError> {
        let body = CreateTodo {
            title: &title,
            user_id,
            completed: false,
        };

        let response = self
            .client
            .post(self.collection_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<Todo>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }

    async fn patch_todo(&self, todo: Todo) -> Result<Todo, ApiError> {
        let response = self
            .client
            .patch(self.todo_url(todo.id))
            .json(&todo)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<Todo>()
            .await
            .map_err(|e| ApiError::ResponseParseFailed(e.to_string()))
    }

    async fn delete_todo(&self, id: TodoId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.todo_url(id))
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        // The body of a successful delete is not used
        check_status(response).await.map(drop)
    }
}

impl Default for HttpTodoApi {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl TodoApi for HttpTodoApi {
    fn list(&self, user_id: UserId) -> ApiFuture<'_, Vec<Todo>> {
        Box::pin(self.fetch_list(user_id))
    }

    fn create(&self, user_id: UserId, title: String) -> ApiFuture<'_, Todo> {
        Box::pin(self.post_todo(user_id, title))
    }

    fn update(&self, todo: Todo) -> ApiFuture<'_, Todo> {
        Box::pin(self.patch_todo(todo))
    }

    fn delete(&self, id: TodoId) -> ApiFuture<'_, ()> {
        Box::pin(self.delete_todo(id))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
