//! HTTP and WebSocket transport.
//!
//! Routes:
//! - `GET /health`
//! - `GET /tools`
//! - `POST /tools/{name}`
//! - `POST /agent` (also `/api/genai/react`)
//! - `POST /crawl` (also `/api/genai/agent`)
//! - `POST /validate-website` (also `/api/validator/validate-website`)
//! - `GET /ws`

pub mod dto;
mod error;
mod routes;
mod ws;

pub use error::{ApiError, ErrorResponse};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::orchestrator::Orchestrator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
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
        .route("/health", get(routes::health))
        .route("/tools", get(routes::tools))
        .route("/tools/{name}", post(routes::call_tool))
        .route("/agent", post(routes::agent))
        .route("/api/genai/react", post(routes::agent))
        .route("/crawl", post(routes::crawl))
        .route("/api/genai/agent", post(routes::crawl))
        .route("/validate-website", post(routes::validate_website))
        .route(
            "/api/validator/validate-website",
            post(routes::validate_website),
        )
        .route("/ws", get(ws::upgrade))
        .layer(cors)
        .with_state(state)
}

/// Serve the router on an already-bound listener until the process stops.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
