use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

#[cfg(test)]
mod tests;

use config::{AppConfig, RunMode};
use services::{account_service::AccountService, blob_store::DiskBlobStore};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting gallery with config: {:?}", cfg);

    // --- Ensure media directory exists ---
    if !Path::new(&cfg.media_root).exists() {
        fs::create_dir_all(&cfg.media_root)
            .await
            .with_context(|| format!("creating media root {}", cfg.media_root))?;
        tracing::info!("Created media directory at {}", cfg.media_root);
    }

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    match mode {
        RunMode::Migrate => {
            db::run_migrations(&db).await?;
            tracing::info!("Database migration complete.");
            return Ok(());
        }
        RunMode::PromoteAdmin(email) => {
            let user = AccountService::new(db.clone())
                .promote_admin(&email)
                .await
                .with_context(|| format!("promoting {}", email))?;
            tracing::info!("{} is now staff", user.email);
            return Ok(());
        }
        RunMode::Serve => db::run_migrations(&db).await?,
    }

    // --- Initialize services ---
    let blobs = Arc::new(DiskBlobStore::new(&cfg.media_root));
    tracing::info!("Storing album files under {}", blobs.root().display());
    let state = AppState::new(db.clone(), blobs);

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes()).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
