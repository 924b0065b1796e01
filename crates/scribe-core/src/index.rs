//! Collaborator traits for the downstream vector index.

use crate::error::Result;
use crate::types::{Chunk, ChunkId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Summary statistics reported by a vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored entries.
    pub total_documents: u64,
    /// Dimensionality of stored vectors, if any vectors exist.
    pub dimension: Option<usize>,
}

/// Destination for chunks produced by the pipeline.
///
/// Implementations must accept an empty chunk list and return no ids for it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store chunks, returning one opaque id per chunk.
    async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkId>>;

    async fn stats(&self) -> Result<IndexStats>;
}

/// Turns text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the embedding model, stored alongside vectors.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
