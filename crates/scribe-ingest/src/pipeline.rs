//! Process files and hand their chunks to the vector index.

use crate::orchestrator::BatchOrchestrator;
use crate::processor::DocumentProcessor;
use scribe_config::Config;
use scribe_core::{BatchReport, VectorIndex};
use scribe_process::{OcrChain, Transcriber};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of [`Ingestor::process_and_add_files`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_chunks: usize,
    /// Ids returned by the index for this call.
    pub documents_added: usize,
    /// Index size after the call, when the index could report it.
    pub total_documents: Option<u64>,
    pub report: BatchReport,
    pub error: Option<String>,
}

/// Orchestrator plus vector index.
pub struct Ingestor {
    orchestrator: BatchOrchestrator,
    index: Arc<dyn VectorIndex>,
}

impl Ingestor {
    pub fn new(orchestrator: BatchOrchestrator, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            orchestrator,
            index,
        }
    }

    pub fn from_config(
        config: &Config,
        ocr: Option<Arc<OcrChain>>,
        transcriber: Option<Arc<dyn Transcriber>>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let processor = DocumentProcessor::from_config(config, ocr, transcriber);
        Self::new(
            BatchOrchestrator::new(Arc::new(processor), config.processing.batch_size),
            index,
        )
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Process `paths` and add every resulting chunk to the index in one call.
    ///
    /// When no file succeeds the index is not touched.
    pub async fn process_and_add_files(&self, paths: &[PathBuf]) -> IngestReport {
        let report = self.orchestrator.process_many(paths).await;

        let mut outcome = IngestReport {
            success: false,
            files_processed: report.successful.len(),
            files_failed: report.failed.len(),
            total_chunks: report.total_chunks,
            documents_added: 0,
            total_documents: None,
            error: None,
            report,
        };

        if outcome.report.successful.is_empty() {
            warn!("No documents were successfully processed");
            outcome.error = Some("No documents were successfully processed".to_string());
            return outcome;
        }

        let chunks = outcome.report.all_chunks();
        match self.index.add_chunks(chunks).await {
            Ok(ids) => {
                info!(
                    "Added {} chunks from {} files to the index",
                    ids.len(),
                    outcome.files_processed
                );
                outcome.documents_added = ids.len();
                outcome.success = true;
            }
            Err(e) => {
                error!("Failed to add chunks to the index: {}", e);
                outcome.error = Some(format!("Failed to add chunks to the index: {}", e));
                return outcome;
            }
        }

        match self.index.stats().await {
            Ok(stats) => outcome.total_documents = Some(stats.total_documents),
            Err(e) => warn!("Could not read index stats: {}", e),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkConfig, Chunker};
    use crate::extractors::Extractors;
    use crate::testing::RecordingIndex;

    fn ingestor(index: Arc<RecordingIndex>) -> Ingestor {
        let processor = DocumentProcessor::new(
            Extractors::new(None, None),
            Chunker::new(ChunkConfig::new(50, 10)),
            10.0,
            None,
        );
        Ingestor::new(BatchOrchestrator::new(Arc::new(processor), 5), index)
    }

    #[tokio::test]
    async fn test_chunks_reach_index_in_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "First note.").unwrap();
        std::fs::write(&b, "Second note. It is a bit longer than fifty characters in total.")
            .unwrap();

        let index = Arc::new(RecordingIndex::default());
        let outcome = ingestor(index.clone())
            .process_and_add_files(&[a, b, dir.path().join("c.bin")])
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.files_processed, 2);
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(index.calls(), 1);
        assert_eq!(outcome.documents_added, outcome.total_chunks);
        assert_eq!(outcome.total_documents, Some(outcome.total_chunks as u64));
    }

    #[tokio::test]
    async fn test_nothing_processed_skips_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(RecordingIndex::default());
        let outcome = ingestor(index.clone())
            .process_and_add_files(&[dir.path().join("missing.txt")])
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("No documents were successfully processed")
        );
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_index_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, "Note.").unwrap();

        let index = Arc::new(RecordingIndex::failing("disk full"));
        let outcome = ingestor(index).process_and_add_files(&[a]).await;

        assert!(!outcome.success);
        assert_eq!(outcome.files_processed, 1);
        assert!(outcome.error.unwrap().contains("disk full"));
    }
}
