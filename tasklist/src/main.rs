//! Tasklist demo binary
//!
//! Loads the configured user's todos from the remote store and prints every
//! filter's view with the footer counters.

use anyhow::Context;
use tasklist::{Config, Filter, TodoApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tasklist=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let app = TodoApp::from_config(&config).context("invalid configuration")?;

    tracing::info!(api_url = %config.api_url, user_id = config.user_id, "Starting tasklist");
    println!("=== Tasklist (user {}) ===\n", config.user_id);

    if !app.load().await? {
        if let Some(error) = app.state(|s| s.error).await {
            println!("{error}");
        }
        app.dismiss_error().await?;
        app.shutdown(None).await?;
        return Ok(());
    }

    for filter in Filter::ALL {
        app.set_filter(filter).await?;
        let state = app.snapshot().await;

        println!("{filter} ({})", filter.fragment());
        let rows = state.visible();
        if rows.is_empty() {
            println!("  (nothing to show)");
        }
        for todo in rows {
            let status = if todo.completed { "✓" } else { " " };
            println!("  [{status}] {:>6}  {}", todo.id, todo.title);
        }
        println!();
    }

    let state = app.snapshot().await;
    if state.is_empty() {
        println!("No todos yet.");
    } else {
        println!(
            "{} items left, {} completed{}",
            state.active_count(),
            state.completed_count(),
            if state.all_completed() { " (all done)" } else { "" }
        );
    }

    app.shutdown(None).await?;
    Ok(())
}
