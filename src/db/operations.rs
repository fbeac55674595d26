use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::ImageCatalog;
use crate::models::ImageRecord;
use crate::types::AppResult;

const IMAGE_COLUMNS: &str = r#"id, url, mime_type, small_url, medium_url, large_url,
    title, caption, alt_text, license, attribution, privacy, created_by,
    "timestamp", view_count, download_count"#;

/// Postgres-backed image catalog.
#[derive(Clone)]
pub struct PgImageCatalog {
    pool: PgPool,
}

impl PgImageCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `%query%` pattern with LIKE wildcards in the query taken literally.
pub fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl ImageCatalog for PgImageCatalog {
    async fn match_text(&self, query: &str) -> AppResult<Vec<ImageRecord>> {
        let sql = format!(
            r#"SELECT {} FROM images
            WHERE title ILIKE $1 ESCAPE '\'
               OR caption ILIKE $1 ESCAPE '\'
               OR alt_text ILIKE $1 ESCAPE '\'"#,
            IMAGE_COLUMNS
        );

        let images = sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(contains_pattern(query))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = images.len(), "Lexical image match completed");
        Ok(images)
    }

    async fn fetch_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ImageRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM images WHERE id = ANY($1)", IMAGE_COLUMNS);
        let images = sqlx::query_as::<_, ImageRecord>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(images)
    }
}
