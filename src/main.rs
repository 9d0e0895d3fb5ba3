//! Doc Cache - cache-aside access to a document store
//!
//! Serves the Configuration CRUD API over a cached document store.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_cache::api::create_router;
use doc_cache::{spawn_sweep_task, AppState, Config};

/// Main entry point for the Doc Cache server.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber for logging
/// 3. Create the cache and open the document store gateway
/// 4. Start background TTL sweep task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM, stop the sweep and flush the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // Debug logging only in debuggable environments, RUST_LOG overrides
    let default_filter = if config.env_is_debuggable() {
        "doc_cache=debug,tower_http=info"
    } else {
        "doc_cache=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Doc Cache server");
    info!(
        "Configuration loaded: env={}, db={}, cache_enabled={}, cache_ttl={}s, check_period={}s, port={}",
        config.api_env,
        config.db_name,
        config.cache_enabled,
        config.cache_ttl,
        config.cache_check_period,
        config.server_port
    );

    let state = AppState::from_config(&config).context("failed to open document store")?;
    info!("Cache and document store initialized");

    let sweep_handle = spawn_sweep_task(state.cache.clone(), config.cache_check_period());
    info!("Background sweep task started");

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweep_handle.abort();
    warn!("Sweep task aborted");
    state.cache.log_stats().await;
    state.cache.flush_all().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
