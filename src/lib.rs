// Gallery Search - hybrid lexical and semantic image search

pub mod config;
pub mod db;
pub mod embeddings;    // Embedding cache and provider clients
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;        // Hybrid search coordinator
pub mod types;
pub mod utils;
pub mod vector_index;  // Remote ANN index (Qdrant)

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use search::{HybridSearch, SearchPolicy};
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
