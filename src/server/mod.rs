// Server module
// HTTP surface over the document service

pub mod error;
pub mod routes;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::service::DocumentService;
use crate::{DocQueryError, Result};

pub type AppState = Arc<DocumentService>;

/// Build the router. Any origin, method and header is allowed.
#[inline]
pub fn router(service: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/upload/",
            post(routes::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/query/", post(routes::query))
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn serve(config: &ServerConfig, service: AppState) -> Result<()> {
    let address = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = address.parse().map_err(|e| {
        DocQueryError::Other(anyhow::anyhow!("Invalid listen address {}: {}", address, e))
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(service, config.max_upload_bytes)).await?;
    Ok(())
}
