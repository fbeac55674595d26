use std::sync::Arc;

use crate::config::Config;
use crate::search::HybridSearch;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub search: Arc<HybridSearch>,
}

// Row of the `images` table owned by the gallery backend.
// Note: FromRow is needed for runtime query_as (without DATABASE_URL at compile time)

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: uuid::Uuid,
    pub url: String,
    pub mime_type: String,
    pub small_url: Option<String>,
    pub medium_url: Option<String>,
    pub large_url: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
    pub license: Option<String>,
    pub attribution: Option<String>,
    pub privacy: String,
    pub created_by: uuid::Uuid,
    pub timestamp: chrono::NaiveDateTime,
    pub view_count: i32,
    pub download_count: i32,
}

/// A search hit: the image plus its similarity when it came from the
/// vector phase. Lexical matches carry no score.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankedImage {
    #[serde(flatten)]
    pub image: ImageRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl RankedImage {
    pub fn lexical(image: ImageRecord) -> Self {
        Self { image, score: None }
    }

    pub fn semantic(image: ImageRecord, score: f32) -> Self {
        Self {
            image,
            score: Some(score),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub cached_embeddings: usize,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}
