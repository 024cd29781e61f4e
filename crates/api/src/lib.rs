//! `api` crate — HTTP control surface.
//!
//! Exposes:
//!   POST /api/v1/campaigns/:id/start
//!   POST /api/v1/campaigns/:id/pause
//!   POST /api/v1/campaigns/:id/resume
//!   GET  /api/v1/campaigns/:id/status
//!   POST /webhooks/replies

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use engine::{CampaignOrchestrator, Stores};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CampaignOrchestrator>,
    pub stores: Stores,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/campaigns/:id/start", post(handlers::campaigns::start))
        .route("/campaigns/:id/pause", post(handlers::campaigns::pause))
        .route("/campaigns/:id/resume", post(handlers::campaigns::resume))
        .route("/campaigns/:id/status", get(handlers::campaigns::status));

    Router::new()
        .nest("/api/v1", api_router)
        .route("/webhooks/replies", post(handlers::webhooks::capture_reply))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
