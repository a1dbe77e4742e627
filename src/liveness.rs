//! HTTP liveness probe for hosts that restart unresponsive processes.

use crate::config::LivenessConfig;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::watch;

use std::net::SocketAddr;

/// Spawn the liveness HTTP server as a background tokio task.
///
/// The server shuts down when `shutdown_rx` signals true.
pub async fn start_liveness_server(
    config: &LivenessConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let bind = bind_address(config)?;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|error| anyhow::anyhow!("failed to bind liveness server to {}: {}", bind, error))?;

    tracing::info!(address = %bind, "liveness server started");

    let handle = tokio::spawn(async move {
        let mut shutdown_rx = shutdown_rx;
        let shutdown_signal = async move {
            let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await;
        };

        if let Err(error) = axum::serve(listener, router())
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!(%error, "liveness server failed");
        }
    });

    Ok(handle)
}

fn router() -> Router {
    Router::new()
        .route("/", get(alive_handler))
        .route("/health", get(health_handler))
}

fn bind_address(config: &LivenessConfig) -> anyhow::Result<SocketAddr> {
    let raw_bind = config.bind.trim_start_matches('[').trim_end_matches(']');
    let bind_str = if raw_bind.contains(':') {
        format!("[{}]:{}", raw_bind, config.port)
    } else {
        format!("{}:{}", raw_bind, config.port)
    };
    bind_str.parse().map_err(|error| {
        anyhow::anyhow!("invalid liveness bind address '{}': {}", bind_str, error)
    })
}

async fn alive_handler() -> &'static str {
    "Bot is alive!"
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
