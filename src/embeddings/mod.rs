// Embedding generation and caching

pub mod cache;
pub mod client;
pub mod provider;
pub mod replicate;

pub use cache::{CacheKey, EmbeddingCache, EmbeddingVector};
pub use client::EmbeddingClient;
pub use provider::{interpret_output, EmbeddingBackend, EmbeddingInput, EmbeddingOutcome};
pub use replicate::ReplicateClient;
