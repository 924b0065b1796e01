//! Error types for the ingestion pipeline.

use scribe_core::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {actual_mb:.1}MB (max: {max_mb}MB)")]
    FileTooLarge { actual_mb: f64, max_mb: f64 },

    /// An extractor reported failure; `kind` is the extractor's classification.
    #[error("{message}")]
    ExtractionFailed {
        path: PathBuf,
        message: String,
        kind: FailureKind,
    },

    #[error("Transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Index error: {0}")]
    Index(#[from] scribe_core::Error),

    #[error("Fingerprint store error: {0}")]
    Fingerprint(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl IngestError {
    /// Classify for batch reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::FileNotFound(_) => FailureKind::NotFound,
            IngestError::UnsupportedFileType(_) => FailureKind::Unsupported,
            IngestError::FileTooLarge { .. } => FailureKind::TooLarge,
            IngestError::ExtractionFailed { kind, .. } => *kind,
            IngestError::TranscriptionUnavailable(_) => FailureKind::TranscriptionUnavailable,
            IngestError::Ocr(_) => FailureKind::Ocr,
            IngestError::Index(_) => FailureKind::Index,
            IngestError::Io(_) => FailureKind::Extraction,
            IngestError::Fingerprint(_) | IngestError::Watch(_) => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_message_names_both_sizes() {
        let err = IngestError::FileTooLarge {
            actual_mb: 150.04,
            max_mb: 100.0,
        };
        assert_eq!(err.to_string(), "File too large: 150.0MB (max: 100MB)");
        assert_eq!(err.kind(), FailureKind::TooLarge);
    }

    #[test]
    fn test_extraction_failure_keeps_extractor_kind() {
        let err = IngestError::ExtractionFailed {
            path: PathBuf::from("memo.mp3"),
            message: "Transcription unavailable: whisper not found".to_string(),
            kind: FailureKind::TranscriptionUnavailable,
        };
        assert!(err.kind().is_feature_absent());
        assert_eq!(
            err.to_string(),
            "Transcription unavailable: whisper not found"
        );
    }
}
