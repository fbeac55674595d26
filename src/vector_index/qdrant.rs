// Qdrant vector index client (REST API)
// API Reference: https://api.qdrant.tech/api-reference

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{CollectionSpec, DistanceMetric, IndexedPoint, ScoredPoint, VectorIndex};
use crate::config::VectorIndexConfig;
use crate::types::{AppError, AppResult};

pub struct QdrantClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    // Collections ensured by this client, by name.
    ready: RwLock<HashMap<String, CollectionSpec>>,
}

#[derive(Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: DistanceMetric,
}

#[derive(Serialize)]
struct UpsertPointsRequest<'a> {
    points: [PointStruct<'a>; 1],
}

#[derive(Serialize)]
struct PointStruct<'a> {
    id: String,
    vector: &'a [f32],
    payload: Value,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
}

impl QdrantClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
            ready: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &VectorIndexConfig) -> Self {
        let client = Self::new(&config.url).with_timeout(Duration::from_secs(config.timeout_secs));
        match &config.api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    async fn ready_spec(&self, collection: &str) -> AppResult<CollectionSpec> {
        self.ready
            .read()
            .await
            .get(collection)
            .cloned()
            .ok_or_else(|| AppError::CollectionNotReady(collection.to_string()))
    }

    async fn api_error(operation: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::VectorIndex(format!("Qdrant {} failed ({}): {}", operation, status, body))
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> AppResult<()> {
        let body = CreateCollectionRequest {
            vectors: VectorParams {
                size: spec.dimension,
                distance: spec.metric,
            },
        };

        let response = self
            .request(self.client.put(self.collection_url(&spec.name)))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            // Conflict: another process created it first.
            s if s.is_success() || s == StatusCode::CONFLICT => {
                info!(
                    collection = %spec.name,
                    dimension = spec.dimension,
                    "Created vector collection"
                );
                Ok(())
            }
            _ => Err(Self::api_error("create collection", response).await),
        }
    }
}

/// Vector size of an existing collection, when configured as a single
/// unnamed vector.
fn existing_dimension(info: &Value) -> Option<usize> {
    info.pointer("/config/params/vectors/size")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> AppResult<()> {
        let response = self
            .request(self.client.get(self.collection_url(&spec.name)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => self.create_collection(spec).await?,
            s if s.is_success() => {
                let info: QdrantResponse<Value> = response.json().await?;
                if let Some(actual) = existing_dimension(&info.result) {
                    if actual != spec.dimension {
                        return Err(AppError::DimensionMismatch {
                            expected: spec.dimension,
                            actual,
                        });
                    }
                }
                debug!(collection = %spec.name, "Vector collection already exists");
            }
            _ => return Err(Self::api_error("get collection", response).await),
        }

        self.ready
            .write()
            .await
            .insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: IndexedPoint) -> AppResult<()> {
        let spec = self.ready_spec(collection).await?;
        if point.vector.len() != spec.dimension {
            return Err(AppError::DimensionMismatch {
                expected: spec.dimension,
                actual: point.vector.len(),
            });
        }

        let body = UpsertPointsRequest {
            points: [PointStruct {
                id: point.id.to_string(),
                vector: &point.vector,
                payload: point.payload.unwrap_or_else(|| Value::Object(Default::default())),
            }],
        };

        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let response = self.request(self.client.put(&url)).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Self::api_error("upsert", response).await);
        }

        debug!(collection, id = %point.id, "Upserted vector point");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredPoint>> {
        let spec = self.ready_spec(collection).await?;
        if vector.len() != spec.dimension {
            return Err(AppError::DimensionMismatch {
                expected: spec.dimension,
                actual: vector.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let body = SearchRequest {
            vector,
            limit: top_k,
            with_payload: false,
        };
        let url = format!("{}/points/search", self.collection_url(collection));
        let response = self.request(self.client.post(&url)).json(&body).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                warn!(collection, "Vector collection missing, returning no matches");
                Ok(Vec::new())
            }
            s if s.is_success() => {
                let hits: QdrantResponse<Vec<SearchHit>> = response.json().await?;
                let points: Vec<ScoredPoint> = hits
                    .result
                    .into_iter()
                    .take(top_k)
                    .map(|hit| ScoredPoint {
                        id: point_id(&hit.id),
                        score: hit.score,
                    })
                    .collect();
                debug!(collection, count = points.len(), "Vector query completed");
                Ok(points)
            }
            _ => Err(Self::api_error("search", response).await),
        }
    }
}
