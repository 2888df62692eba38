//! Axum server setup
//!
//! Owns the process lifecycle of the pool: `initialize` before binding,
//! `shutdown` after the serve loop exits, on both success and error.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::cors::{CorsConfig, CorsError};
use super::routes;
use crate::db::{ConnectionPool, PoolError};
use crate::metrics::{MetricsError, RequestCounter};
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8000)
    pub bind_addr: SocketAddr,

    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors: CorsConfig::default(),
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Cors(#[from] CorsError),
}

/// Build the application router with all routes
pub fn build_router(state: AppState, cors: &CorsConfig) -> Result<Router, ServerError> {
    Ok(Router::new()
        .merge(routes::health::router())
        .merge(routes::items::router())
        .merge(routes::metrics::router())
        .layer(cors.layer()?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Run the HTTP server.
///
/// Initializes `pool` first; a failure there is fatal and nothing is bound.
/// Blocks until Ctrl+C or SIGTERM, then shuts the pool down.
///
/// # Example
///
/// ```ignore
/// let pool = ConnectionPool::new(PgConnector::from_config(&db), db);
/// run_server(pool, ServerConfig::default()).await?;
/// ```
pub async fn run_server(pool: ConnectionPool, config: ServerConfig) -> Result<(), ServerError> {
    pool.initialize().await?;

    let result = serve(pool.clone(), config).await;
    pool.shutdown().await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Server stopped with error");
    }
    result
}

async fn serve(pool: ConnectionPool, config: ServerConfig) -> Result<(), ServerError> {
    let state = AppState::new(pool, RequestCounter::new()?);
    let app = build_router(state, &config.cors)?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}
