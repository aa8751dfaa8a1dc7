// Expense Tracker - Web Server
// REST API with Axum + static login/register/dashboard pages

use anyhow::{Context, Result};
use clap::Parser;
use expense_tracker::api::{router, AppState};
use expense_tracker::config::ServerConfig;
use expense_tracker::{db, logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    logging::init(&config.common.log_filter);

    let conn = config.common.open_database()?;
    let purged = db::purge_expired_sessions(&conn, db::now())?;
    info!(database = ?config.common.database, purged_sessions = purged, "database opened");

    let state = AppState::new(conn, config.session_ttl());
    let app = router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("server running on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
