//! Vector Index
//!
//! Remote approximate nearest-neighbor index. Collections have a fixed
//! dimension chosen at creation; changing the embedding size means creating
//! a new collection.

pub mod qdrant;

pub use qdrant::QdrantClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::types::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclid),
            other => Err(format!("unknown distance metric: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }
}

/// One indexed image.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Option<serde_json::Value>,
}

/// A nearest-neighbor hit. The id is kept as the index reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> AppResult<()>;

    /// Insert or overwrite a point by id.
    async fn upsert(&self, collection: &str, point: IndexedPoint) -> AppResult<()>;

    /// Up to `top_k` nearest points ordered by descending score.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredPoint>>;
}
