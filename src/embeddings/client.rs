use std::sync::Arc;
use tracing::{debug, info};

use super::cache::{CacheKey, EmbeddingCache};
use super::provider::{EmbeddingBackend, EmbeddingInput, EmbeddingOutcome};

/// Embedding generation with the cache as first-line lookup.
///
/// Only non-empty vectors are cached, so a provider failure is retried on the
/// next call instead of being remembered.
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<EmbeddingCache>,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, cache: Arc<EmbeddingCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub async fn embed_image(&self, image_bytes: &[u8]) -> EmbeddingOutcome {
        let key = CacheKey::image(image_bytes);
        self.embed_cached(key, EmbeddingInput::Image(image_bytes)).await
    }

    pub async fn embed_text(&self, text: &str) -> EmbeddingOutcome {
        let key = CacheKey::text(text);
        self.embed_cached(key, EmbeddingInput::Text(text)).await
    }

    async fn embed_cached(&self, key: CacheKey, input: EmbeddingInput<'_>) -> EmbeddingOutcome {
        if let Some(vector) = self.cache.get(&key).await {
            debug!(kind = input.kind(), key = %key.short(), "Using cached embedding");
            return EmbeddingOutcome::Vector(vector);
        }

        info!(kind = input.kind(), key = %key.short(), "Generating new embedding");
        let outcome = self.backend.embed(input).await;

        if let EmbeddingOutcome::Vector(vector) = &outcome {
            if !vector.is_empty() {
                self.cache.put(&key, vector.clone()).await;
                debug!(
                    kind = input.kind(),
                    key = %key.short(),
                    dims = vector.len(),
                    "Cached embedding"
                );
            }
        }

        outcome
    }
}
