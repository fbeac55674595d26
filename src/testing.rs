// In-memory collaborators for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::db::ImageCatalog;
use crate::embeddings::{EmbeddingBackend, EmbeddingInput, EmbeddingOutcome};
use crate::models::ImageRecord;
use crate::types::{AppError, AppResult};
use crate::vector_index::{CollectionSpec, IndexedPoint, ScoredPoint, VectorIndex};

pub fn catalog_image(title: &str, caption: Option<&str>) -> ImageRecord {
    let id = Uuid::new_v4();
    ImageRecord {
        id,
        url: format!("{}_original.png", id),
        mime_type: "image/png".to_string(),
        small_url: Some(format!("{}_small.png", id)),
        medium_url: Some(format!("{}_medium.png", id)),
        large_url: Some(format!("{}_large.png", id)),
        title: Some(title.to_string()),
        caption: caption.map(String::from),
        alt_text: None,
        license: None,
        attribution: None,
        privacy: "public".to_string(),
        created_by: Uuid::nil(),
        timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .naive_utc(),
        view_count: 0,
        download_count: 0,
    }
}

pub fn hit(id: Uuid, score: f32) -> ScoredPoint {
    ScoredPoint {
        id: id.to_string(),
        score,
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/test".to_string()),
        _ => None,
    })
    .unwrap()
}

/// Embedding backend that always answers with the same outcome.
pub struct ScriptedBackend {
    outcome: EmbeddingOutcome,
    calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self::with_outcome(EmbeddingOutcome::Vector(vector))
    }

    pub fn with_outcome(outcome: EmbeddingOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for ScriptedBackend {
    async fn embed(&self, input: EmbeddingInput<'_>) -> EmbeddingOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let EmbeddingInput::Image(_) = input {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.outcome.clone()
    }
}

/// Catalog over a fixed list of images, recording lookups.
pub struct InMemoryCatalog {
    images: Vec<ImageRecord>,
    match_calls: AtomicUsize,
    fetched: Mutex<Vec<Vec<Uuid>>>,
}

impl InMemoryCatalog {
    pub fn new(images: Vec<ImageRecord>) -> Self {
        Self {
            images,
            match_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn match_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched(&self) -> Vec<Vec<Uuid>> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageCatalog for InMemoryCatalog {
    async fn match_text(&self, query: &str) -> AppResult<Vec<ImageRecord>> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        let needle = query.to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .map(|value| value.to_lowercase().contains(&needle))
                .unwrap_or(false)
        };

        Ok(self
            .images
            .iter()
            .filter(|img| contains(&img.title) || contains(&img.caption) || contains(&img.alt_text))
            .cloned()
            .collect())
    }

    async fn fetch_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ImageRecord>> {
        self.fetched.lock().unwrap().push(ids.to_vec());
        // Store order, not request order.
        Ok(self
            .images
            .iter()
            .filter(|img| ids.contains(&img.id))
            .cloned()
            .collect())
    }
}

/// Vector index returning canned hits.
pub struct StaticIndex {
    hits: Vec<ScoredPoint>,
    fail: bool,
    ready: bool,
    dimension: Option<usize>,
    query_calls: AtomicUsize,
    upserts: Mutex<Vec<(String, IndexedPoint)>>,
    ensured: Mutex<Vec<CollectionSpec>>,
}

impl StaticIndex {
    pub fn with_hits(hits: Vec<ScoredPoint>) -> Self {
        Self {
            hits,
            fail: false,
            ready: true,
            dimension: None,
            query_calls: AtomicUsize::new(0),
            upserts: Mutex::new(Vec::new()),
            ensured: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_hits(Vec::new())
        }
    }

    /// An index whose collection was never prepared.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::with_hits(Vec::new())
        }
    }

    /// An index that rejects vectors of any other size.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::with_hits(Vec::new())
        }
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> Vec<(String, IndexedPoint)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn ensured(&self) -> Vec<CollectionSpec> {
        self.ensured.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> AppResult<()> {
        self.ensured.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: IndexedPoint) -> AppResult<()> {
        if self.fail {
            return Err(AppError::VectorIndex("index unavailable".to_string()));
        }
        if let Some(expected) = self.dimension {
            if point.vector.len() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: point.vector.len(),
                });
            }
        }
        self.upserts
            .lock()
            .unwrap()
            .push((collection.to_string(), point));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        _vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredPoint>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if !self.ready {
            return Err(AppError::CollectionNotReady(collection.to_string()));
        }
        if self.fail {
            return Err(AppError::VectorIndex("index unavailable".to_string()));
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}
