//! Embedding Cache
//!
//! Content-addressed store of embedding vectors, kept in memory and written
//! through to a single JSON snapshot file. The file is read lazily on first
//! access; a missing or corrupted file yields an empty cache rather than an
//! error, so the worst case is a cache that always misses.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Ordered embedding components. Length is not checked here.
pub type EmbeddingVector = Vec<f32>;

const IMAGE_TAG: &str = "image_";
const TEXT_TAG: &str = "text_";

/// Hex-encoded SHA-256 digest of a tagged payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for encoded image bytes: the tag is applied to the content hash.
    pub fn image(bytes: &[u8]) -> Self {
        let content_hash = hex::encode(Sha256::digest(bytes));
        Self::tagged(IMAGE_TAG, &content_hash)
    }

    /// Key for a text query: the raw text is hashed together with its tag.
    pub fn text(text: &str) -> Self {
        Self::tagged(TEXT_TAG, text)
    }

    fn tagged(tag: &str, payload: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tag.as_bytes());
        hasher.update(payload.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, enough to correlate log lines.
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable key→vector cache shared across requests.
pub struct EmbeddingCache {
    path: PathBuf,
    // `None` until the snapshot has been loaded.
    entries: Mutex<Option<HashMap<String, EmbeddingVector>>>,
}

impl EmbeddingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &CacheKey) -> Option<EmbeddingVector> {
        let mut guard = self.entries.lock().await;
        let entries = self.loaded(&mut guard).await;
        entries.get(key.as_str()).cloned()
    }

    /// Insert a vector and rewrite the snapshot file.
    ///
    /// Entries are immutable: a key that is already present is left as is.
    pub async fn put(&self, key: &CacheKey, vector: EmbeddingVector) {
        let mut guard = self.entries.lock().await;
        let entries = self.loaded(&mut guard).await;

        if entries.contains_key(key.as_str()) {
            debug!(key = %key.short(), "Cache entry already present, keeping original");
            return;
        }
        entries.insert(key.as_str().to_string(), vector);

        if let Err(e) = self.persist(entries).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist embedding cache");
        }
    }

    pub async fn len(&self) -> usize {
        let mut guard = self.entries.lock().await;
        self.loaded(&mut guard).await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn loaded<'a>(
        &self,
        slot: &'a mut Option<HashMap<String, EmbeddingVector>>,
    ) -> &'a mut HashMap<String, EmbeddingVector> {
        if slot.is_none() {
            *slot = Some(self.load().await);
        }
        slot.get_or_insert_with(HashMap::new)
    }

    async fn load(&self) -> HashMap<String, EmbeddingVector> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No embedding cache file found, starting empty");
                return HashMap::new();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Embedding cache unreadable, starting empty"
                );
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, EmbeddingVector>>(&content) {
            Ok(entries) => {
                info!(path = %self.path.display(), count = entries.len(), "Loaded embedding cache");
                entries
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Embedding cache malformed, starting empty"
                );
                HashMap::new()
            }
        }
    }

    async fn persist(&self, entries: &HashMap<String, EmbeddingVector>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}
