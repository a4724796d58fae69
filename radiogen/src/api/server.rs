//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::config::{AppConfig, StreamConfig};
use crate::database::repositories::JobRepository;
use crate::error::Result;
use crate::services::QueueProcessor;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn JobRepository>,
    pub processor: Arc<QueueProcessor>,
    pub stream: StreamConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        processor: Arc<QueueProcessor>,
        stream: StreamConfig,
    ) -> Self {
        Self {
            repository,
            processor,
            stream,
            start_time: Instant::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/health", routes::health::router())
        .nest("/api/jobs", routes::jobs::router())
        .nest("/api/process", routes::process::router())
        .nest("/api/status", routes::status::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(config: &AppConfig, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| crate::Error::Configuration(format!("invalid bind address: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
