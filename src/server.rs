//! Server assembly: state construction, router, bind, graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::{GenerationSettings, ServerConfig};
use crate::generation::{GenerationClient, HttpGenerationClient};
use crate::store::{ProjectStore, StoreHandle};
use crate::sync::pipeline::SyncOptions;

/// Build the application router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Start the storymill server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let store = ProjectStore::new(&config.db_path).context("Failed to initialize store")?;

    let generation: Option<Arc<dyn GenerationClient>> = match GenerationSettings::from_env() {
        Some(settings) => Some(Arc::new(HttpGenerationClient::new(settings))),
        None => {
            // The server still starts; generation endpoints fail their
            // precondition check until a credential is configured.
            warn!("no generation credential configured; generation endpoints will return 500");
            None
        }
    };

    let state = Arc::new(AppState {
        store: StoreHandle::new(store),
        generation,
        sync_options: SyncOptions {
            workdir_root: config.workdir_root.clone(),
            ..SyncOptions::default()
        },
    });

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(addr = %listener.local_addr()?, "storymill listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
    }
}
