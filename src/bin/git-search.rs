//! git-search: web front end for looking up commits, authors and repositories
//! in the git-indexer database.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use git_indexer::config::load_settings;
use git_indexer::search::web::{router, AppState};
use git_indexer::search::Database;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_settings()?;
    git_indexer::cli::init_logging(false, &settings)?;

    let db = Database::from_settings(&settings);
    // fail fast on an unusable database instead of on the first request
    db.open()
        .with_context(|| format!("Cannot open database {}", settings.sqlite_path().display()))?;

    let app = router(AppState { db });
    let listener = TcpListener::bind(&settings.search_bind)
        .await
        .with_context(|| format!("Cannot bind {}", settings.search_bind))?;
    info!("git-search listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Search server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
