//! Todo list client kept in sync with a remote CRUD store.
//!
//! The collection is fetched once, then changed one request at a time: a
//! create appends the server's copy, an update replaces it in place and a
//! delete removes it. While a request is in flight the affected row shows a
//! loader, and a failed request leaves the collection untouched and shows an
//! error notification that dismisses itself after a few seconds.
//!
//! - [`types`]: todos, filters, the screen state and its actions
//! - [`client`]: the [`TodoApi`] seam and its HTTP implementation
//! - [`reducer`]: every state transition of the screen
//! - [`app`]: [`TodoApp`], awaitable operations reporting their outcome
//! - [`config`]: environment-based configuration
//! - `mocks`: an in-memory [`TodoApi`] for tests (`test-utils` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use tasklist::{Config, Filter, TodoApp};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = TodoApp::from_config(&Config::from_env())?;
//!
//! app.load().await?;
//! app.add("Buy milk").await?;
//! app.set_filter(Filter::Active).await?;
//!
//! let state = app.snapshot().await;
//! println!("{} items left", state.active_count());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use app::TodoApp;
pub use client::{HttpTodoApi, TodoApi};
pub use config::Config;
pub use error::{ApiError, AppError, ConfigError, TodoError};
pub use reducer::{TodoEnvironment, TodoReducer};
pub use types::{
    BatchOutcome, EditOutcome, Filter, RequestId, Todo, TodoAction, TodoId, TodoState, UserId,
};
