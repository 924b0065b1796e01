//! Chunk and embedding persistence.

use crate::database::Database;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use scribe_core::{new_id, Chunk, ChunkId};

/// One row of the `chunks` table, plus its vector when embedded.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: ChunkId,
    pub document_hash: String,
    pub source_path: Option<String>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub content: String,
    /// Full chunk metadata as JSON.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StoredChunk {
    /// Give a pipeline chunk a fresh id.
    pub fn from_chunk(chunk: &Chunk) -> StoreResult<Self> {
        let meta = &chunk.metadata;
        Ok(Self {
            id: new_id(),
            document_hash: meta.document.document_hash.clone(),
            source_path: meta
                .document
                .extra
                .get("file_path")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            chunk_index: meta.chunk_id,
            total_chunks: meta.total_chunks,
            content: chunk.text.clone(),
            metadata: serde_json::to_value(meta)?,
            created_at: Utc::now(),
        })
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata: String = row.get(6)?;
        let created_at: String = row.get(7)?;
        Ok(Self {
            id: row.get(0)?,
            document_hash: row.get(1)?,
            source_path: row.get(2)?,
            chunk_index: row.get::<_, i64>(3)? as usize,
            total_chunks: row.get::<_, i64>(4)? as usize,
            content: row.get(5)?,
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vector(bytes: &[u8], dimensions: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(dimensions)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

impl Database {
    /// Insert chunks and their optional embeddings in one transaction.
    ///
    /// `embeddings`, when given, must be parallel to `chunks`.
    pub fn insert_chunks(
        &self,
        chunks: &[StoredChunk],
        embeddings: Option<(&[Vec<f32>], &str)>,
    ) -> StoreResult<()> {
        if let Some((vectors, _)) = embeddings {
            if vectors.len() != chunks.len() {
                return Err(StoreError::Other(format!(
                    "{} embeddings for {} chunks",
                    vectors.len(),
                    chunks.len()
                )));
            }
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut insert_chunk = tx.prepare(
                r#"
                INSERT INTO chunks (id, document_hash, source_path, chunk_index, total_chunks,
                                    content, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for chunk in chunks {
                insert_chunk.execute(params![
                    chunk.id,
                    chunk.document_hash,
                    chunk.source_path,
                    chunk.chunk_index as i64,
                    chunk.total_chunks as i64,
                    chunk.content,
                    chunk.metadata.to_string(),
                    chunk.created_at.to_rfc3339(),
                ])?;
            }

            if let Some((vectors, model)) = embeddings {
                let mut insert_vector = tx.prepare(
                    r#"
                    INSERT OR REPLACE INTO embeddings (chunk_id, vector, model, dimensions)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )?;
                for (chunk, vector) in chunks.iter().zip(vectors) {
                    insert_vector.execute(params![
                        chunk.id,
                        vector_to_bytes(vector),
                        model,
                        vector.len() as i64,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_chunk(&self, id: &str) -> StoreResult<StoredChunk> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, document_hash, source_path, chunk_index, total_chunks, content, metadata, created_at
             FROM chunks WHERE id = ?1",
            params![id],
            StoredChunk::from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Chunk not found: {}", id))
            }
            _ => StoreError::from(e),
        })
    }

    /// All chunks of one document, in chunk order.
    pub fn get_chunks_by_document(&self, document_hash: &str) -> StoreResult<Vec<StoredChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_hash, source_path, chunk_index, total_chunks, content, metadata, created_at
             FROM chunks WHERE document_hash = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![document_hash], StoredChunk::from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_embedding(&self, chunk_id: &str) -> StoreResult<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT vector, dimensions FROM embeddings WHERE chunk_id = ?1",
                params![chunk_id],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(bytes, dimensions)| bytes_to_vector(&bytes, dimensions as usize)))
    }

    pub fn chunk_count(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Distinct documents (by content hash).
    pub fn document_count(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT document_hash) FROM chunks",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn has_document(&self, document_hash: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chunks WHERE document_hash = ?1)",
            params![document_hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Dimensionality of stored vectors, `None` when nothing is embedded.
    pub fn embedding_dimensions(&self) -> StoreResult<Option<usize>> {
        let conn = self.conn()?;
        let dims: Option<i64> =
            conn.query_row("SELECT MAX(dimensions) FROM embeddings", [], |row| row.get(0))?;
        Ok(dims.map(|d| d as usize))
    }
}
