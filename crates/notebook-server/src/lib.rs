//! HTTP + SSE server exposing the reactive notebook engine over the wire.
//!
//! The server has no state of its own beyond a `Scheduler`: every handler is
//! a thin translation from an HTTP request to a `Scheduler` call and back to
//! a DTO (`protocol`). Non-cell errors become HTTP 4xx/5xx via `ServerError`.

pub mod error;
pub mod protocol;
pub mod routes;

pub use error::{ServerError, ServerResult};
pub use routes::{create_router, AppState};

use std::net::SocketAddr;

/// Runtime configuration for the HTTP/SSE server (SPEC_FULL.md §4.K).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind: SocketAddr,
    /// Seed `NotebookSettings.dsn` at startup, if given.
    pub dsn: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".parse().unwrap(), dsn: None }
    }
}

/// Binds and serves the notebook HTTP/SSE API until a Ctrl-C is received.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.dsn);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "starting notebook server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_localhost() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.port(), 8080);
        assert!(config.dsn.is_none());
    }
}
