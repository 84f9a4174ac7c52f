//! Error types for the tasklist client

use tasklist_runtime::StoreError;
use thiserror::Error;

/// User-facing failure shown in the error notification
///
/// The `Display` text is the message the notification renders. At most one
/// is active at a time; "no error" is `Option::None` in the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TodoError {
    /// The initial list fetch failed
    #[error("Unable to load todos")]
    LoadFailed,

    /// A create request failed
    #[error("Unable to add a todo")]
    AddFailed,

    /// A delete request failed
    #[error("Unable to delete a todo")]
    DeleteFailed,

    /// An update request failed
    #[error("Unable to update a todo")]
    UpdateFailed,

    /// A new todo was submitted with a blank title; nothing was sent
    #[error("Title should not be empty")]
    EmptyTitle,
}

/// Errors returned by the remote todo store
///
/// Every variant is a transport failure from the controller's point of view;
/// the distinction only matters for logging.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request could not be sent or no response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The server answered with a non-2xx status
    #[error("API error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// The response body was not the expected JSON
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No user id configured (or the reserved id 0)
    #[error("A non-zero user id is required (set TASKLIST_USER_ID)")]
    MissingUserId,

    /// The API base URL is empty or not http(s)
    #[error("Invalid API base URL: {0:?}")]
    InvalidApiUrl(String),
}

/// A filter name that is not one of All, Active or Completed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown filter: {0:?}")]
pub struct ParseFilterError(pub String);

/// Errors surfaced by [`TodoApp`](crate::app::TodoApp)
///
/// Remote failures are not errors at this level: they are reported through
/// the operation's outcome and the state's error slot.
#[derive(Debug, Error)]
pub enum AppError {
    /// The underlying store rejected the action or lost its result
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}
