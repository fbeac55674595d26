use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::ImageRecord;
use crate::types::AppResult;
use anyhow::Result;

pub use operations::*;

pub mod operations;

/// Image metadata held in the relational store.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Images whose title, caption or alt text contains `query`,
    /// case-insensitively, in the store's natural order.
    async fn match_text(&self, query: &str) -> AppResult<Vec<ImageRecord>>;

    /// Batched lookup. Unknown ids are absent from the result; order is not
    /// guaranteed.
    async fn fetch_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ImageRecord>>;
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    // Test connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    Ok(pool)
}
