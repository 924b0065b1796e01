//! Audio extractor backed by a transcription collaborator.

use super::{base_metadata, Extractor};
use crate::error::IngestError;
use async_trait::async_trait;
use scribe_core::{ContentItem, ExtractionResult, FailureKind, FileKind};
use scribe_process::Transcriber;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Transcribes audio files.
///
/// A missing or uninitializable transcriber is reported as
/// [`FailureKind::TranscriptionUnavailable`], not as an extraction error.
pub struct AudioExtractor {
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl AudioExtractor {
    pub fn new(transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        Self { transcriber }
    }

    fn unavailable(path: &Path, reason: impl Into<String>) -> ExtractionResult {
        let error = IngestError::TranscriptionUnavailable(reason.into()).to_string();
        let mut metadata = base_metadata("audio", path);
        metadata.insert("error".to_string(), error.clone().into());
        ExtractionResult::failed(FailureKind::TranscriptionUnavailable, error)
            .with_metadata_defaults(metadata)
    }
}

#[async_trait]
impl Extractor for AudioExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Audio
    }

    async fn extract(&self, path: &Path) -> ExtractionResult {
        if !path.exists() {
            return ExtractionResult::failed(
                FailureKind::NotFound,
                format!("File not found: {}", path.display()),
            )
            .with_metadata_defaults(base_metadata("audio", path));
        }

        let Some(transcriber) = &self.transcriber else {
            return Self::unavailable(path, "no transcription backend configured");
        };

        if !transcriber.is_initialized() {
            info!("Initializing transcriber {}", transcriber.name());
            if let Err(e) = transcriber.initialize().await {
                warn!("Transcriber {} failed to initialize: {}", transcriber.name(), e);
                return Self::unavailable(path, e.to_string());
            }
        }

        let result = transcriber.transcribe(path).await;

        let mut metadata = base_metadata("audio", path);
        metadata.insert(
            "transcription_method".to_string(),
            transcriber.name().into(),
        );

        if !result.success {
            return ExtractionResult::failed(
                FailureKind::Extraction,
                result
                    .error
                    .unwrap_or_else(|| "Transcription failed".to_string()),
            )
            .with_metadata_defaults(metadata);
        }

        metadata.insert("segments".to_string(), result.segments.len().into());
        if let Some(language) = result.language {
            metadata.insert("language".to_string(), language.into());
        }
        ExtractionResult::ok(vec![ContentItem::text(result.text)], metadata)
    }
}
