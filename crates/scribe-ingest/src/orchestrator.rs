//! Wave-based concurrent processing of many files.

use crate::processor::DocumentProcessor;
use chrono::Utc;
use futures_util::future::join_all;
use scribe_core::{BatchReport, FailedFile, FailureKind, MemorySnapshot, SystemMemory};
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::System;
use tracing::{debug, info, warn};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Processes files in fixed-size concurrent waves, reclaiming OCR memory
/// between waves.
pub struct BatchOrchestrator {
    processor: Arc<DocumentProcessor>,
    batch_size: usize,
}

impl BatchOrchestrator {
    /// A zero batch size is treated as one.
    pub fn new(processor: Arc<DocumentProcessor>, batch_size: usize) -> Self {
        Self {
            processor,
            batch_size: batch_size.max(1),
        }
    }

    pub fn processor(&self) -> &Arc<DocumentProcessor> {
        &self.processor
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Process every path, one wave at a time.
    ///
    /// A file that fails, or whose task panics, becomes an entry in
    /// `failed`; it never aborts the wave or the batch.
    pub async fn process_many(&self, paths: &[PathBuf]) -> BatchReport {
        let waves = paths.len().div_ceil(self.batch_size);
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for (wave_index, wave) in paths.chunks(self.batch_size).enumerate() {
            info!(
                "Processing wave {}/{} ({} files)",
                wave_index + 1,
                waves,
                wave.len()
            );

            let handles = wave.iter().cloned().map(|path| {
                let processor = Arc::clone(&self.processor);
                tokio::spawn(async move { processor.process_document(&path).await })
            });
            let outcomes = join_all(handles).await;

            for (path, outcome) in wave.iter().zip(outcomes) {
                match outcome {
                    Ok(Ok(processed)) => successful.push(processed),
                    Ok(Err(e)) => {
                        warn!("Failed to process {:?}: {}", path, e);
                        failed.push(FailedFile {
                            file: path.clone(),
                            error: e.to_string(),
                            kind: e.kind(),
                        });
                    }
                    Err(e) => {
                        warn!("Processing task for {:?} aborted: {}", path, e);
                        failed.push(FailedFile {
                            file: path.clone(),
                            error: format!("Processing task failed: {}", e),
                            kind: FailureKind::Internal,
                        });
                    }
                }
            }

            self.reclaim_memory().await;
        }

        let total_chunks = successful.iter().map(|f| f.chunks.len()).sum();
        info!(
            "Batch complete: {} succeeded, {} failed, {} chunks",
            successful.len(),
            failed.len(),
            total_chunks
        );

        BatchReport {
            total_documents: successful.len(),
            total_chunks,
            successful,
            failed,
            memory_usage: self.memory_snapshot().await,
        }
    }

    async fn reclaim_memory(&self) {
        if let Some(ocr) = self.processor.ocr() {
            debug!("Reclaiming OCR memory");
            ocr.cleanup_memory().await;
        }
    }

    /// OCR engine memory plus system memory, as of now.
    pub async fn memory_snapshot(&self) -> MemorySnapshot {
        let ocr = match self.processor.ocr() {
            Some(ocr) => ocr.memory_usage().await,
            None => None,
        };
        MemorySnapshot {
            ocr,
            system: system_memory(),
            taken_at: Utc::now(),
        }
    }
}

fn system_memory() -> Option<SystemMemory> {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return None;
    }
    let available = sys.available_memory();
    Some(SystemMemory {
        total_gb: total as f64 / BYTES_PER_GB,
        available_gb: available as f64 / BYTES_PER_GB,
        percent_used: (total.saturating_sub(available)) as f64 / total as f64 * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkConfig, Chunker};
    use crate::extractors::Extractors;
    use crate::testing::{stub_chain, StubOcr};
    use std::sync::atomic::Ordering;

    fn orchestrator(batch_size: usize) -> BatchOrchestrator {
        let processor = DocumentProcessor::new(
            Extractors::new(None, None),
            Chunker::new(ChunkConfig::new(100, 20)),
            1.0,
            None,
        );
        BatchOrchestrator::new(Arc::new(processor), batch_size)
    }

    #[tokio::test]
    async fn test_invalid_files_are_reported_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..7 {
            let path = dir.path().join(format!("doc{}.txt", i));
            std::fs::write(&path, format!("Document number {}.", i)).unwrap();
            paths.push(path);
        }
        let unsupported = dir.path().join("archive.zip");
        std::fs::write(&unsupported, b"PK").unwrap();
        let oversized = dir.path().join("huge.txt");
        std::fs::write(&oversized, vec![b'a'; 2 * 1024 * 1024]).unwrap();
        paths.insert(2, unsupported.clone());
        paths.insert(5, oversized.clone());
        paths.push(dir.path().join("gone.txt"));

        let report = orchestrator(3).process_many(&paths).await;

        assert_eq!(report.total_documents, paths.len() - 3);
        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.total_chunks, 7);
        assert_eq!(report.failed[0].file, unsupported);
        assert_eq!(report.failed[0].kind, FailureKind::Unsupported);
        assert_eq!(report.failed[1].file, oversized);
        assert_eq!(report.failed[1].kind, FailureKind::TooLarge);
        assert_eq!(report.failed[2].kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                let path = dir.path().join(format!("{}.txt", i));
                std::fs::write(&path, "x".repeat(10 + i * 100)).unwrap();
                path
            })
            .collect();

        let report = orchestrator(5).process_many(&paths).await;
        let files: Vec<PathBuf> = report.successful.iter().map(|f| f.file.clone()).collect();
        assert_eq!(files, paths);
    }

    #[tokio::test]
    async fn test_memory_reclaimed_after_every_wave() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                let path = dir.path().join(format!("{}.txt", i));
                std::fs::write(&path, "text").unwrap();
                path
            })
            .collect();

        let engine = Arc::new(StubOcr::ok("layout_vlm", "unused"));
        let ocr = stub_chain(vec![engine.clone()]);
        let processor = DocumentProcessor::new(
            Extractors::new(Some(ocr.clone()), None),
            Chunker::new(ChunkConfig::default()),
            10.0,
            Some(ocr),
        );

        let report = BatchOrchestrator::new(Arc::new(processor), 2)
            .process_many(&paths)
            .await;
        assert_eq!(report.total_documents, 5);
        assert_eq!(engine.cleanups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let report = orchestrator(5).process_many(&[]).await;
        assert_eq!(report.total_documents, 0);
        assert!(report.failed.is_empty());
        assert!(report.memory_usage.ocr.is_none());
    }
}
