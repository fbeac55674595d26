//! Hybrid Search Coordinator
//!
//! Pipeline for one query:
//!
//! 1. **Lexical**: substring match in the relational store
//! 2. **Embed**: text embedding of the query (cached)
//! 3. **Vector**: k-NN query against the image collection
//! 4. **Merge**: cutoff, dedupe, and order the two sets
//! 5. **Hydrate**: one batched lookup for the semantic ids
//!
//! The lexical phase runs alongside the embed→vector chain. Failures of the
//! embedding provider or the vector index only remove the semantic signal;
//! the request still succeeds with lexical matches. A collection that was
//! never prepared is an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MergeOrder, SearchPolicy};
use crate::db::ImageCatalog;
use crate::embeddings::{EmbeddingClient, EmbeddingOutcome};
use crate::models::{ImageRecord, RankedImage};
use crate::types::{AppError, AppResult};
use crate::vector_index::{IndexedPoint, ScoredPoint, VectorIndex};

pub struct HybridSearch {
    catalog: Arc<dyn ImageCatalog>,
    embedder: Arc<EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    policy: SearchPolicy,
}

impl HybridSearch {
    pub fn new(
        catalog: Arc<dyn ImageCatalog>,
        embedder: Arc<EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            catalog,
            embedder,
            index,
            policy,
        }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Arc<dyn ImageCatalog> {
        &self.catalog
    }

    pub fn embedder(&self) -> &Arc<EmbeddingClient> {
        &self.embedder
    }

    /// Create the image collection if needed. Failure here is fatal for the
    /// serving process.
    pub async fn ensure_collection(&self) -> AppResult<()> {
        self.index.ensure_collection(&self.policy.collection).await
    }

    /// Search images by free text, lexical matches first.
    pub async fn combined_search(&self, query: &str) -> AppResult<Vec<RankedImage>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let (lexical, semantic) = tokio::join!(
            self.catalog.match_text(query),
            self.semantic_hits(query)
        );
        let lexical = lexical?;

        let Some(hits) = semantic? else {
            info!(query, lexical = lexical.len(), "No query embedding, using text search only");
            return Ok(lexical.into_iter().map(RankedImage::lexical).collect());
        };

        let results = match self.policy.merge_order {
            MergeOrder::LexicalFirst => {
                let lexical_ids: HashSet<Uuid> = lexical.iter().map(|img| img.id).collect();
                let remainder =
                    semantic_remainder(&lexical_ids, hits, self.policy.similarity_cutoff);
                let semantic = self.hydrate(&remainder).await?;

                info!(
                    query,
                    lexical = lexical.len(),
                    semantic = semantic.len(),
                    "Combined search completed"
                );
                lexical
                    .into_iter()
                    .map(RankedImage::lexical)
                    .chain(semantic)
                    .collect()
            }
            MergeOrder::SemanticFirst => {
                let remainder =
                    semantic_remainder(&HashSet::new(), hits, self.policy.similarity_cutoff);
                let semantic = self.hydrate(&remainder).await?;
                let semantic_ids: HashSet<Uuid> = semantic.iter().map(|r| r.image.id).collect();

                info!(
                    query,
                    lexical = lexical.len(),
                    semantic = semantic.len(),
                    "Combined search completed"
                );
                semantic
                    .into_iter()
                    .chain(
                        lexical
                            .into_iter()
                            .filter(|img| !semantic_ids.contains(&img.id))
                            .map(RankedImage::lexical),
                    )
                    .collect()
            }
        };

        Ok(results)
    }

    /// Embed an image and store it in the collection under `image_id`.
    ///
    /// Without an embedding the image is left unindexed and the call still
    /// succeeds; index errors propagate.
    pub async fn index_image(&self, image_id: Uuid, image_bytes: &[u8]) -> AppResult<()> {
        if image_bytes.is_empty() {
            return Err(AppError::InvalidRequest("image body is empty".to_string()));
        }

        let vector = match self.embedder.embed_image(image_bytes).await {
            EmbeddingOutcome::Vector(vector) => vector,
            outcome => {
                warn!(
                    image_id = %image_id,
                    outcome = ?outcome,
                    "No embedding for image, skipping index"
                );
                return Ok(());
            }
        };

        let point = IndexedPoint {
            id: image_id,
            vector,
            payload: Some(serde_json::json!({ "image_id": image_id })),
        };
        self.index.upsert(&self.policy.collection.name, point).await?;

        info!(
            image_id = %image_id,
            collection = %self.policy.collection.name,
            "Indexed image embedding"
        );
        Ok(())
    }

    /// Nearest neighbors of the query text, or `None` when there is no
    /// embedding to search with.
    ///
    /// Querying a collection that was never prepared is an error; other
    /// index failures leave the semantic set empty.
    async fn semantic_hits(&self, query: &str) -> AppResult<Option<Vec<ScoredPoint>>> {
        let vector = match self.embedder.embed_text(query).await {
            EmbeddingOutcome::Vector(vector) if !vector.is_empty() => vector,
            outcome => {
                warn!(outcome = ?outcome, "Query embedding unavailable");
                return Ok(None);
            }
        };
        debug!(dims = vector.len(), "Generated query vector");

        match self
            .index
            .query(&self.policy.collection.name, &vector, self.policy.top_k)
            .await
        {
            Ok(hits) => Ok(Some(hits)),
            Err(e @ AppError::CollectionNotReady(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Vector query failed, no semantic matches");
                Ok(Some(Vec::new()))
            }
        }
    }

    /// Full records for scored ids, in the given order. Ids the store does
    /// not know are dropped.
    async fn hydrate(&self, scored: &[(Uuid, f32)]) -> AppResult<Vec<RankedImage>> {
        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = scored.iter().map(|(id, _)| *id).collect();
        let mut by_id: HashMap<Uuid, ImageRecord> = self
            .catalog
            .fetch_by_ids(&ids)
            .await?
            .into_iter()
            .map(|img| (img.id, img))
            .collect();

        Ok(scored
            .iter()
            .filter_map(|(id, score)| {
                by_id
                    .remove(id)
                    .map(|img| RankedImage::semantic(img, *score))
            })
            .collect())
    }
}

/// Semantic hits that survive the cutoff, as parsed ids in score order.
///
/// Keeps `score > cutoff`, skips ids that are not UUIDs, ids in `exclude`,
/// and repeats.
pub fn semantic_remainder(
    exclude: &HashSet<Uuid>,
    hits: Vec<ScoredPoint>,
    cutoff: f32,
) -> Vec<(Uuid, f32)> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| hit.score > cutoff)
        .filter_map(|hit| match Uuid::parse_str(&hit.id) {
            Ok(id) => Some((id, hit.score)),
            Err(_) => {
                debug!(id = %hit.id, "Skipping non-UUID vector hit");
                None
            }
        })
        .filter(|(id, _)| !exclude.contains(id) && seen.insert(*id))
        .collect()
}
