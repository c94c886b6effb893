//! Web server module.

mod handlers;

pub use handlers::*;

use crate::aggregate::Aggregator;
use crate::cache::ReportCache;
use crate::config::ServerConfig;
use crate::registry::Registry;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<Registry>,
    pub aggregator: Aggregator,
    pub cache: Arc<ReportCache>,
    pub started_at: Instant,
}

/// Web server for the cockpit.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        registry: Arc<Registry>,
        aggregator: Aggregator,
        cache: Arc<ReportCache>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                registry,
                aggregator,
                cache,
                started_at: Instant::now(),
            },
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = routes(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the router with all routes.
pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        // Dashboard
        .route("/", get(handlers::handle_dashboard))
        // Aggregation API
        .route("/health-aggregate/{group}", get(handlers::handle_health_aggregate))
        .route("/cache/invalidate/{group}", post(handlers::handle_invalidate))
        .route("/api/groups", get(handlers::handle_groups))
        // Service health
        .route("/health", get(handlers::handle_health))
        // Static assets
        .route("/favicon.ico", get(handlers::handle_favicon))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}
