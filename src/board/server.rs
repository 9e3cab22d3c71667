use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::api::{self, AppState};
use super::auth;
use super::db::{BoardDb, DbHandle};
use crate::config::ServerConfig;

/// Build the full application router: API routes plus request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Open (or create) the board database at `config.db_path`.
pub fn open_database(config: &ServerConfig) -> Result<BoardDb> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    BoardDb::new(&config.db_path).context("Failed to initialize board database")
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Start the board server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let identity_config = config.identity.as_ref().context(
        "No identity provider configured: set SUPABASE_URL and SUPABASE_ANON_KEY, or KANBAN_DEV_TOKENS",
    )?;
    let identity = auth::provider_from_config(identity_config)?;
    let db = open_database(&config)?;

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        identity,
    });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, db = %config.db_path.display(), dev = config.dev_mode, "kanban server listening");
    println!("Kanban board running at http://{}", local_addr);

    serve(listener, app, shutdown_signal()).await?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("shutdown requested");
}
