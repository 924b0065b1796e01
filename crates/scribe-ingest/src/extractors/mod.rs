//! Per-format extractors.
//!
//! Every extractor returns an [`ExtractionResult`] instead of an error, so a
//! failing file is reported alongside the files that worked.

mod audio;
mod docx;
mod image;
mod pdf;
mod text;

pub use audio::AudioExtractor;
pub use docx::DocxExtractor;
pub use image::{layout_items, ImageExtractor, LayoutCounts};
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

use async_trait::async_trait;
use scribe_config::Config;
use scribe_core::{ExtractionResult, FailureKind, FileKind, Metadata};
use scribe_process::{OcrChain, Transcriber};
use std::path::Path;
use std::sync::Arc;

/// Strategy for turning one kind of file into content items.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn kind(&self) -> FileKind;

    async fn extract(&self, path: &Path) -> ExtractionResult;
}

/// One extractor per [`FileKind`].
pub struct Extractors {
    pdf: PdfExtractor,
    docx: DocxExtractor,
    text: TextExtractor,
    image: ImageExtractor,
    audio: AudioExtractor,
}

impl Extractors {
    /// Wire extractors to the external collaborators. Either may be absent,
    /// in which case images (and scanned PDFs) or audio fail per file.
    pub fn new(ocr: Option<Arc<OcrChain>>, transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        Self {
            pdf: PdfExtractor::new(ocr.clone()),
            docx: DocxExtractor,
            text: TextExtractor,
            image: ImageExtractor::new(ocr),
            audio: AudioExtractor::new(transcriber),
        }
    }

    pub fn from_config(
        config: &Config,
        ocr: Option<Arc<OcrChain>>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        let mut extractors = Self::new(ocr, transcriber);
        extractors.pdf = extractors
            .pdf
            .with_scanned_threshold(config.ocr.scanned_pdf_min_chars);
        extractors
    }

    pub fn for_kind(&self, kind: FileKind) -> &dyn Extractor {
        match kind {
            FileKind::Pdf => &self.pdf,
            FileKind::WordDoc => &self.docx,
            FileKind::Text => &self.text,
            FileKind::Image => &self.image,
            FileKind::Audio => &self.audio,
        }
    }
}

/// `file_type` and `file_path`, present on every result.
pub(crate) fn base_metadata(file_type: &str, path: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("file_type".to_string(), file_type.into());
    metadata.insert(
        "file_path".to_string(),
        path.to_string_lossy().to_string().into(),
    );
    metadata
}

/// Failure result for an unreadable file, with the path metadata attached.
pub(crate) fn read_failure(file_type: &str, path: &Path, err: &std::io::Error) -> ExtractionResult {
    let kind = if err.kind() == std::io::ErrorKind::NotFound {
        FailureKind::NotFound
    } else {
        FailureKind::Extraction
    };
    ExtractionResult::failed(kind, format!("Failed to read {}: {}", path.display(), err))
        .with_metadata_defaults(base_metadata(file_type, path))
}
