//! Single-document pipeline: gate, extract, normalize, chunk.

use crate::chunker::Chunker;
use crate::error::{IngestError, IngestResult};
use crate::extractors::Extractors;
use crate::normalizer::normalize;
use scribe_config::Config;
use scribe_core::{FileKind, ProcessedFile};
use scribe_process::{OcrChain, Transcriber};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Turns one file into chunks.
pub struct DocumentProcessor {
    extractors: Extractors,
    chunker: Chunker,
    max_file_size_mb: f64,
    ocr: Option<Arc<OcrChain>>,
}

impl DocumentProcessor {
    pub fn new(
        extractors: Extractors,
        chunker: Chunker,
        max_file_size_mb: f64,
        ocr: Option<Arc<OcrChain>>,
    ) -> Self {
        Self {
            extractors,
            chunker,
            max_file_size_mb,
            ocr,
        }
    }

    pub fn from_config(
        config: &Config,
        ocr: Option<Arc<OcrChain>>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        Self::new(
            Extractors::from_config(config, ocr.clone(), transcriber),
            Chunker::from_config(&config.processing),
            config.processing.max_file_size_mb,
            ocr,
        )
    }

    /// The OCR chain shared with the image and PDF extractors.
    pub fn ocr(&self) -> Option<&Arc<OcrChain>> {
        self.ocr.as_ref()
    }

    /// Prepare the OCR chain. Fails only when no OCR engine can run.
    pub async fn initialize(&self) -> IngestResult<()> {
        if let Some(ocr) = &self.ocr {
            ocr.initialize()
                .await
                .map_err(|e| IngestError::Ocr(e.to_string()))?;
        }
        info!("Document processor initialized");
        Ok(())
    }

    /// Process one file.
    ///
    /// Missing, unsupported and oversized files are rejected before any
    /// extractor runs. Extractor failures keep the extractor's
    /// classification.
    pub async fn process_document(&self, path: &Path) -> IngestResult<ProcessedFile> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => return Err(IngestError::FileNotFound(path.to_path_buf())),
        };

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let kind = FileKind::from_extension(&extension)
            .ok_or_else(|| IngestError::UnsupportedFileType(extension.clone()))?;

        let file_size_mb = meta.len() as f64 / BYTES_PER_MB;
        if file_size_mb > self.max_file_size_mb {
            return Err(IngestError::FileTooLarge {
                actual_mb: file_size_mb,
                max_mb: self.max_file_size_mb,
            });
        }

        debug!("Extracting {:?} as {}", path, kind);
        let extraction = self.extractors.for_kind(kind).extract(path).await;
        if !extraction.success {
            return Err(IngestError::ExtractionFailed {
                path: path.to_path_buf(),
                message: extraction
                    .error
                    .unwrap_or_else(|| "extraction failed".to_string()),
                kind: extraction
                    .failure
                    .unwrap_or(scribe_core::FailureKind::Extraction),
            });
        }

        let document = normalize(&extraction, file_size_mb);
        let chunks = self.chunker.chunk_document(&document);

        info!("Processed {:?}: {} chunks", path, chunks.len());
        Ok(ProcessedFile {
            file: path.to_path_buf(),
            chunks,
            metadata: document.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkConfig;
    use crate::testing::{stub_chain, StubOcr};
    use scribe_core::FailureKind;
    use std::sync::atomic::Ordering;

    fn processor(ocr: Option<Arc<OcrChain>>, max_mb: f64) -> DocumentProcessor {
        DocumentProcessor::new(
            Extractors::new(ocr.clone(), None),
            Chunker::new(ChunkConfig::new(1000, 200)),
            max_mb,
            ocr,
        )
    }

    #[tokio::test]
    async fn test_unsupported_type_never_reaches_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("anim.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();

        let engine = Arc::new(StubOcr::ok("layout_vlm", "text"));
        let processor = processor(Some(stub_chain(vec![engine.clone()])), 100.0);

        let err = processor.process_document(&gif).await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: .gif");
        assert_eq!(err.kind(), FailureKind::Unsupported);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("big.png");
        std::fs::write(&png, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let engine = Arc::new(StubOcr::ok("layout_vlm", "text"));
        let processor = processor(Some(stub_chain(vec![engine.clone()])), 1.0);

        let err = processor.process_document(&png).await.unwrap_err();
        assert_eq!(err.to_string(), "File too large: 2.0MB (max: 1MB)");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = processor(None, 100.0)
            .process_document(Path::new("/nonexistent/a.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_text_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("note.TXT");
        std::fs::write(&note, "A short note.").unwrap();

        let processed = processor(None, 100.0).process_document(&note).await.unwrap();
        assert_eq!(processed.chunks.len(), 1);
        assert_eq!(processed.chunks[0].text, "A short note.");
        let meta = &processed.chunks[0].metadata;
        assert_eq!(meta.total_chunks, 1);
        assert_eq!(meta.document.extra["file_type"], "txt");
        assert!(meta.document.layout_aware);
        assert!(processed.metadata.file_size_mb > 0.0);
    }

    #[tokio::test]
    async fn test_table_scan_sets_has_tables() {
        let dir = tempfile::tempdir().unwrap();
        let scan = dir.path().join("scan.png");
        std::fs::write(&scan, b"\x89PNG").unwrap();

        let layout = r#"{"elements": [{"category": "Table", "text": "<table><tr><td>7</td></tr></table>", "bbox": [1, 2, 3, 4]}]}"#;
        let engine = Arc::new(StubOcr::ok("layout_vlm", layout));
        let processor = processor(Some(stub_chain(vec![engine])), 100.0);

        let processed = processor.process_document(&scan).await.unwrap();
        let text: String = processed.chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(text.contains("[TABLE]\n<table><tr><td>7</td></tr></table>\n[/TABLE]"));
        assert!(processed.metadata.has_tables);
        assert!(processed.metadata.ocr_enhanced);
        assert_eq!(processed.metadata.table_elements, 1);
    }

    #[tokio::test]
    async fn test_audio_without_transcriber_is_feature_absent() {
        let dir = tempfile::tempdir().unwrap();
        let memo = dir.path().join("memo.mp3");
        std::fs::write(&memo, b"ID3").unwrap();

        let err = processor(None, 100.0).process_document(&memo).await.unwrap_err();
        assert!(err.kind().is_feature_absent());
        assert!(err.to_string().starts_with("Transcription unavailable"));
    }
}
