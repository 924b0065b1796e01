//! `VectorIndex` implementation over the chunk store.

use crate::chunks::StoredChunk;
use crate::database::Database;
use async_trait::async_trait;
use scribe_core::{Chunk, ChunkId, Embedder, Error, IndexStats, Result, VectorIndex};
use std::sync::Arc;
use tracing::{debug, info};

/// Stores chunks in SQLite, embedding them first when an embedder is set.
#[derive(Clone)]
pub struct SqliteIndex {
    db: Database,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SqliteIndex {
    pub fn new(db: Database) -> Self {
        Self { db, embedder: None }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkId>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let stored = chunks
            .iter()
            .map(StoredChunk::from_chunk)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let embeddings = match &self.embedder {
            Some(embedder) => {
                let mut vectors = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    vectors.push(embedder.embed(&chunk.text).await?);
                }
                debug!("Embedded {} chunks with {}", vectors.len(), embedder.model());
                Some((vectors, embedder.model().to_string()))
            }
            None => None,
        };

        let ids: Vec<ChunkId> = stored.iter().map(|c| c.id.clone()).collect();
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let embeddings = embeddings
                .as_ref()
                .map(|(vectors, model)| (vectors.as_slice(), model.as_str()));
            db.insert_chunks(&stored, embeddings)
        })
        .await
        .map_err(|e| Error::Index(e.to_string()))??;

        info!("Indexed {} chunks", ids.len());
        Ok(ids)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<IndexStats> {
            Ok(IndexStats {
                total_documents: db.chunk_count()?,
                dimension: db.embedding_dimensions()?,
            })
        })
        .await
        .map_err(|e| Error::Index(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{ChunkMetadata, DocumentMetadata};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(Error::Embedding("refused".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                chunk_id: 0,
                total_chunks: 1,
                chunk_size: text.len(),
                document: DocumentMetadata {
                    document_hash: format!("hash-{}", text),
                    ..Default::default()
                },
            },
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_accepted() {
        let index = SqliteIndex::new(Database::open_in_memory().unwrap());
        assert!(index.add_chunks(Vec::new()).await.unwrap().is_empty());
        assert_eq!(index.stats().await.unwrap(), IndexStats::default());
    }

    #[tokio::test]
    async fn test_add_returns_one_id_per_chunk() {
        let index = SqliteIndex::new(Database::open_in_memory().unwrap())
            .with_embedder(Arc::new(FixedEmbedder));
        let ids = index
            .add_chunks(vec![chunk("alpha"), chunk("beta")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.dimension, Some(2));
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let index = SqliteIndex::new(Database::open_in_memory().unwrap())
            .with_embedder(Arc::new(FixedEmbedder));
        let result = index.add_chunks(vec![chunk("fine"), chunk("poison")]).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
        assert_eq!(index.database().chunk_count().unwrap(), 0);
    }
}
