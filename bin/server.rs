// Account Mapping Guard - Web Server
// REST API with Axum

use account_mapping_guard::api::{router, AppState};
use account_mapping_guard::{init_tracing, GuardConfig, SqliteStore};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Database path: first argument, then GUARD_DB, then ./account_mappings.db
fn db_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GUARD_DB").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("account_mappings.db"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = GuardConfig::from_env()?;
    let db_path = db_path();

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    tracing::info!(db = %db_path.display(), entity = %config.entity, "database opened");

    let app = router(AppState::new(store, config));

    let addr = std::env::var("GUARD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/mappings", addr);

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
