use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::search::MergeOrder;
use crate::vector_index::DistanceMetric;

const DEFAULT_CLIP_MODEL_VERSION: &str =
    "1c0371070cb827ec3c7f2f28adcdde54b50dcd239aa6faea0bc98b174ef03fb4";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub vector_index: VectorIndexConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub replicate_api_key: String,
    pub replicate_base_url: String,
    pub model_version: String,
    pub timeout_secs: u64,
    pub max_polls: u32,
    pub poll_interval_ms: u64,
    pub cache_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorIndexConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub timeout_secs: u64,
    pub startup_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    pub similarity_cutoff: f32,
    pub merge_order: MergeOrder,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            server: ServerConfig {
                port: var("PORT", "8000").parse().context("PORT")?,
                host: var("HOST", "0.0.0.0"),
                cors_allowed_origins: var("ALLOWED_ORIGINS", "http://localhost:5173")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: var("DB_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("DB_MAX_CONNECTIONS")?,
                min_connections: var("DB_MIN_CONNECTIONS", "1")
                    .parse()
                    .context("DB_MIN_CONNECTIONS")?,
            },
            embedding: EmbeddingConfig {
                replicate_api_key: var("REPLICATE_API_KEY", ""),
                replicate_base_url: var("REPLICATE_BASE_URL", "https://api.replicate.com"),
                model_version: var("REPLICATE_MODEL_VERSION", DEFAULT_CLIP_MODEL_VERSION),
                timeout_secs: var("EMBEDDING_TIMEOUT_SECS", "30")
                    .parse()
                    .context("EMBEDDING_TIMEOUT_SECS")?,
                max_polls: var("EMBEDDING_MAX_POLLS", "10")
                    .parse()
                    .context("EMBEDDING_MAX_POLLS")?,
                poll_interval_ms: var("EMBEDDING_POLL_INTERVAL_MS", "500")
                    .parse()
                    .context("EMBEDDING_POLL_INTERVAL_MS")?,
                cache_path: PathBuf::from(var("EMBEDDING_CACHE_PATH", ".cache.json")),
            },
            vector_index: VectorIndexConfig {
                url: var("QDRANT_URL", "http://localhost:6333"),
                api_key: optional("QDRANT_API_KEY"),
                collection: var("QDRANT_COLLECTION", "images_768"),
                dimension: var("QDRANT_DIMENSION", "768")
                    .parse()
                    .context("QDRANT_DIMENSION")?,
                metric: var("QDRANT_DISTANCE", "cosine")
                    .parse()
                    .map_err(|e: String| anyhow!("QDRANT_DISTANCE: {}", e))?,
                timeout_secs: var("QDRANT_TIMEOUT_SECS", "10")
                    .parse()
                    .context("QDRANT_TIMEOUT_SECS")?,
                startup_retries: var("QDRANT_STARTUP_RETRIES", "5")
                    .parse()
                    .context("QDRANT_STARTUP_RETRIES")?,
            },
            search: SearchConfig {
                top_k: var("SEARCH_TOP_K", "20").parse().context("SEARCH_TOP_K")?,
                similarity_cutoff: var("SEARCH_SIMILARITY_CUTOFF", "0.15")
                    .parse()
                    .context("SEARCH_SIMILARITY_CUTOFF")?,
                merge_order: var("SEARCH_MERGE_ORDER", "lexical_first")
                    .parse()
                    .map_err(|e: String| anyhow!("SEARCH_MERGE_ORDER: {}", e))?,
            },
        })
    }
}
