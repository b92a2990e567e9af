//! HTTP server for the Prometheus scrape endpoint.
//!
//! Runs on a separate tokio task and serves one path (default `/metrics`)
//! with the format negotiated from the `Accept` header.

use crate::error::{MetricsError, MetricsResult};
use crate::metrics::{self, ExpositionFormat};
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use prometheus::Registry;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handler for GET {path} - returns the registry in the negotiated format.
async fn metrics_handler(State(registry): State<Registry>, headers: HeaderMap) -> Response {
    let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
    let format = ExpositionFormat::negotiate(accept);
    match metrics::render(&registry, format) {
        Ok(body) => ([(CONTENT_TYPE, format.content_type())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// A running metrics endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MetricsServer {
    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server task to exit after its shutdown token fired.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "HTTP server task ended abnormally");
        }
    }
}

/// Bind `0.0.0.0:port` and serve `path` until `shutdown` is cancelled.
pub async fn serve(
    registry: Registry,
    port: u16,
    path: &str,
    shutdown: CancellationToken,
) -> MetricsResult<MetricsServer> {
    if !path.starts_with('/') {
        return Err(MetricsError::InvalidPath(path.to_string()));
    }

    let app = Router::new()
        .route(path, get(metrics_handler))
        .with_state(registry);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| MetricsError::Bind { addr, source })?;
    let addr = listener
        .local_addr()
        .map_err(|source| MetricsError::Bind { addr, source })?;
    tracing::info!(%addr, path, "Prometheus HTTP server listening");

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    Ok(MetricsServer { addr, task })
}
