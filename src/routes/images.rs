//! Image search and indexing endpoints
//!
//! - `GET /api/images/search?q=...` - Hybrid lexical + semantic search
//! - `POST /api/images/{id}/embedding` - Embed raw image bytes and index them

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, RankedImage, SearchParams};
use crate::types::{AppError, AppResult};

const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/images/search", get(search_images))
        .route(
            "/api/images/{id}/embedding",
            post(index_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
}

async fn search_images(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<RankedImage>>> {
    let results = state.search.combined_search(&params.q).await?;
    Ok(Json(results))
}

async fn index_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<StatusCode> {
    info!(image_id = %id, bytes = body.len(), "Image embedding request received");

    let known = state.search.catalog().fetch_by_ids(&[id]).await?;
    if known.is_empty() {
        return Err(AppError::NotFound(format!("image {}", id)));
    }

    state.search.index_image(id, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}
