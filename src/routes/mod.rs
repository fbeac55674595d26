//! API Routes
//!
//! - `/api/images/search` - Hybrid image search
//! - `/api/images/{id}/embedding` - Image embedding ingestion
//! - `/api/health` - Health checks

pub mod health;
pub mod images;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let origins = state.config.server.cors_allowed_origins.clone();
    let router = Router::new()
        .merge(images::router())
        .merge(health::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &origins)
}
