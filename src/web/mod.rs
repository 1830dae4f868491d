//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::{ConfigHandle, ServerConfig};
use crate::db::StateStore;
use crate::view::HistoryReader;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub config: Arc<ConfigHandle>,
    pub history: Arc<HistoryReader>,
}

/// Web server for the public status page.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(cfg: &ServerConfig, store: Arc<dyn StateStore>, config: Arc<ConfigHandle>) -> Self {
        Self {
            port: cfg.http_port,
            state: AppState {
                history: Arc::new(HistoryReader::new(store.clone())),
                store,
                config,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        // Dashboard
        .route("/", get(handlers::handle_dashboard))
        // API endpoints
        .route("/api/config", get(handlers::handle_get_config))
        .route("/api/status", get(handlers::handle_get_status))
        .route("/api/history/{id}", get(handlers::handle_get_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
