//! Core domain types for scribe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Free-form metadata attached to content and documents.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Bounding box in `[x1, y1, x2, y2]` form.
pub type BBox = [f64; 4];

/// Unique identifier for chunks stored in an index.
pub type ChunkId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logical kind of an input file, used to dispatch extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    WordDoc,
    Text,
    Image,
    Audio,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::WordDoc => "word_doc",
            FileKind::Text => "text",
            FileKind::Image => "image",
            FileKind::Audio => "audio",
        }
    }

    /// Detect file kind from an extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" | "doc" => Some(FileKind::WordDoc),
            "txt" => Some(FileKind::Text),
            "png" | "jpg" | "jpeg" | "tiff" | "bmp" => Some(FileKind::Image),
            "mp3" | "wav" | "m4a" | "flac" => Some(FileKind::Audio),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque dedup key for one version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFingerprint(String);

impl FileFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type of an extracted content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Table,
    Formula,
    TextBlock,
    RawText,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Table => "table",
            ContentType::Formula => "formula",
            ContentType::TextBlock => "text_block",
            ContentType::RawText => "raw_text",
        }
    }
}

/// A typed unit of extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContentItem {
    pub fn new(kind: ContentType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            bbox: None,
            metadata: Metadata::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ContentType::Text, content)
    }

    pub fn with_bbox(mut self, bbox: Option<BBox>) -> Self {
        self.bbox = bbox;
        self
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Classification of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Unsupported,
    TooLarge,
    Extraction,
    TranscriptionUnavailable,
    Ocr,
    Index,
    Internal,
}

impl FailureKind {
    /// Failures caused by an optional collaborator being absent.
    pub fn is_feature_absent(&self) -> bool {
        matches!(self, FailureKind::TranscriptionUnavailable)
    }
}

/// The unit returned by every format extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub content: Vec<ContentItem>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExtractionResult {
    pub fn ok(content: Vec<ContentItem>, metadata: Metadata) -> Self {
        Self {
            success: true,
            content,
            metadata,
            error: None,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Vec::new(),
            metadata: Metadata::new(),
            error: Some(error.into()),
            failure: Some(kind),
        }
    }

    /// Merge extra metadata, keeping existing keys.
    pub fn with_metadata_defaults(mut self, extra: Metadata) -> Self {
        for (key, value) in extra {
            self.metadata.entry(key).or_insert(value);
        }
        self
    }
}

/// Aggregate metadata for a normalized document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_hash: String,
    pub has_tables: bool,
    pub has_formulas: bool,
    pub has_text_blocks: bool,
    pub ocr_enhanced: bool,
    pub layout_aware: bool,
    pub layout_elements: usize,
    pub text_elements: usize,
    pub table_elements: usize,
    pub formula_elements: usize,
    pub file_size_mb: f64,
    pub total_chars: usize,
    /// Extractor-specific metadata (file path, page count, OCR method, ...).
    #[serde(flatten)]
    pub extra: Metadata,
}

/// Full text of a document with structure markers and aggregate metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Per-chunk metadata: position in the document plus all document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    #[serde(flatten)]
    pub document: DocumentMetadata,
}

/// A retrieval-sized window of a normalized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A file that made it through extraction and chunking.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub file: PathBuf,
    pub chunks: Vec<Chunk>,
    pub metadata: DocumentMetadata,
}

/// A file that failed somewhere in the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file: PathBuf,
    pub error: String,
    pub kind: FailureKind,
}

/// System memory figures at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMemory {
    pub total_gb: f64,
    pub available_gb: f64,
    pub percent_used: f64,
}

/// Point-in-time memory snapshot attached to a batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Memory reported by the primary OCR engine, if any.
    pub ocr: Option<serde_json::Value>,
    pub system: Option<SystemMemory>,
    pub taken_at: DateTime<Utc>,
}

/// Outcome of processing many files.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub successful: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
    pub total_documents: usize,
    pub total_chunks: usize,
    pub memory_usage: MemorySnapshot,
}

impl BatchReport {
    /// All chunks of the successful files, in input order.
    pub fn all_chunks(&self) -> Vec<Chunk> {
        self.successful
            .iter()
            .flat_map(|f| f.chunks.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_extension(".PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("docx"), Some(FileKind::WordDoc));
        assert_eq!(FileKind::from_extension(".tiff"), Some(FileKind::Image));
        assert_eq!(FileKind::from_extension("flac"), Some(FileKind::Audio));
        assert_eq!(FileKind::from_extension(".xyz"), None);
    }

    #[test]
    fn test_content_item_serializes_type_tag() {
        let item = ContentItem::new(ContentType::TextBlock, "hello").with_meta("element_count", 2);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "text_block");
        assert_eq!(json["metadata"]["element_count"], 2);
        assert!(json.get("bbox").is_none());
    }

    #[test]
    fn test_chunk_metadata_flattens_document_metadata() {
        let mut document = DocumentMetadata {
            has_tables: true,
            total_chars: 42,
            ..Default::default()
        };
        document
            .extra
            .insert("file_type".to_string(), serde_json::json!("pdf"));

        let meta = ChunkMetadata {
            chunk_id: 1,
            total_chunks: 3,
            chunk_size: 10,
            document,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["chunk_id"], 1);
        assert_eq!(json["has_tables"], true);
        assert_eq!(json["file_type"], "pdf");
    }

    #[test]
    fn test_extraction_failure_shape() {
        let result = ExtractionResult::failed(FailureKind::TranscriptionUnavailable, "no whisper");
        assert!(!result.success);
        assert!(result.content.is_empty());
        assert!(result.failure.unwrap().is_feature_absent());
    }
}
