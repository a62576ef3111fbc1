use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

mod extractors;
mod handlers;
mod routes;
mod state;

use common::bootstrap;
use common::db::{PgStore, Store};
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be up yet if configuration failed
        eprintln!("todo-api failed to start: {:#}", e);
        tracing::error!(error = %format!("{:#}", e), "API server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load configuration
    let config = bootstrap::load_settings()?;

    telemetry::init_logging(&config.observability)?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        variant = %config.schema.variant,
        "Starting API server"
    );

    let metrics_handle = telemetry::init_metrics()?;

    // Connect with backoff, then create missing tables
    let db_pool = bootstrap::init_database(&config).await?;
    let store = PgStore::new(db_pool.clone());
    let store: Arc<dyn Store> = Arc::new(store);

    let addr = resolve_bind_addr(&config.server.host, config.server.port).await?;

    // Create application state and router
    let state = AppState::new(store, config).with_metrics(metrics_handle);
    let app = routes::create_router(state);

    tracing::info!(addr = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    tracing::info!("API server stopped");
    Ok(())
}

/// Resolve `server.host` (an IP literal or a hostname) to the first usable address
async fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve server host '{}'", host))?
        .next()
        .with_context(|| format!("Server host '{}' resolved to no addresses", host))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_addr_accepts_ip_literals() {
        let addr = resolve_bind_addr("0.0.0.0", 5000).await.unwrap();
        assert_eq!(addr, SocketAddr::from(([0, 0, 0, 0], 5000)));
    }

    #[tokio::test]
    async fn test_bind_addr_resolves_localhost() {
        let addr = resolve_bind_addr("localhost", 5000).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 5000);
    }

    #[tokio::test]
    async fn test_bind_addr_names_unresolvable_host() {
        let err = resolve_bind_addr("no such host", 5000).await.unwrap_err();
        assert!(err.to_string().contains("no such host"));
    }
}
