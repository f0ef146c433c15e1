// Dish Ledger - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use dish_ledger::api::{router, AppState};
use dish_ledger::config::AppConfig;
use dish_ledger::logging::init_logger;
use dish_ledger::{init_database, open_database};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often expired sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var_os("LEDGER_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    init_logger(&config.logging);

    info!("🌐 Dish Ledger - Web Server");

    let db_path = config.prepare_database_path()?;
    let conn = open_database(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("✓ Database opened: {}", db_path.display());

    // Keep serving even when the schema is incomplete, so the problem shows
    // up in /api/debug/db-status instead of a dead port
    if let Err(e) = init_database(&conn) {
        error!("❌ Database initialisation failed: {}", e);
    }

    let state = AppState::new(conn, db_path, &config);
    if state.require_token {
        info!("🔐 Bearer tokens required on data routes");
    }

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.cleanup_expired() {
                Ok(0) => {}
                Ok(removed) => info!("🧹 Removed {} expired sessions", removed),
                Err(e) => warn!("Session sweep failed: {}", e),
            }
        }
    });

    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/health", addr);

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
