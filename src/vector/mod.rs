/// Vector index abstraction
///
/// The engine needs two operations from a nearest-neighbor index: bulk
/// embedding lookup by item id (to average a user's shelf into an interest
/// seed) and a top-k similarity search. Distances are non-negative, lower is
/// more similar, and their scale is implementation-defined — the retriever
/// normalizes per call and never compares raw distances across calls.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod pgvector;

/// Errors from the vector index. These never reach the engine's callers —
/// the retriever degrades to the non-personalized pool instead.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("Vector search error: {0}")]
    Search(String),

    #[error("Embedding lookup error: {0}")]
    Lookup(String),
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub item_id: i64,
    /// Index-defined distance, non-negative, lower = more similar
    pub distance: f64,
}

/// Contract the engine requires from a vector-search collaborator.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fetch stored embeddings for the given item ids. Items without an
    /// embedding are absent from the map.
    async fn embeddings_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<f32>>, VectorIndexError>;

    /// Nearest-neighbor search, at most `top_k` hits ordered by ascending
    /// distance.
    async fn search_similar(
        &self,
        vector: &[f32],
        top_k: u32,
    ) -> Result<Vec<VectorHit>, VectorIndexError>;
}
