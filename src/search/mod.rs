//! Search Module
//!
//! Hybrid image search combining two signals:
//! - Lexical: case-insensitive substring match on title, caption and alt text
//! - Semantic: nearest neighbors of the query's text embedding
//!
//! The two result sets are merged into one deterministic ranking.

pub mod hybrid;

pub use hybrid::{semantic_remainder, HybridSearch};

use serde::Deserialize;
use std::str::FromStr;

use crate::config::Config;
use crate::vector_index::CollectionSpec;

/// Which result set leads the merged ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOrder {
    /// Exact text matches outrank every semantic match.
    #[default]
    LexicalFirst,
    SemanticFirst,
}

impl FromStr for MergeOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical_first" => Ok(MergeOrder::LexicalFirst),
            "semantic_first" => Ok(MergeOrder::SemanticFirst),
            other => Err(format!("unknown merge order: {}", other)),
        }
    }
}

/// Tuning knobs for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPolicy {
    pub collection: CollectionSpec,
    pub top_k: usize,
    /// Semantic hits must score strictly above this.
    pub similarity_cutoff: f32,
    pub merge_order: MergeOrder,
}

impl SearchPolicy {
    pub const DEFAULT_SIMILARITY_CUTOFF: f32 = 0.15;
    pub const DEFAULT_TOP_K: usize = 20;

    pub fn new(collection: CollectionSpec) -> Self {
        Self {
            collection,
            top_k: Self::DEFAULT_TOP_K,
            similarity_cutoff: Self::DEFAULT_SIMILARITY_CUTOFF,
            merge_order: MergeOrder::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let index = &config.vector_index;
        Self {
            collection: CollectionSpec::new(&index.collection, index.dimension, index.metric),
            top_k: config.search.top_k,
            similarity_cutoff: config.search.similarity_cutoff,
            merge_order: config.search.merge_order,
        }
    }
}
