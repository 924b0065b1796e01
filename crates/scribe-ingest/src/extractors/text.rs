//! Plain text extractor.

use super::{base_metadata, read_failure, Extractor};
use async_trait::async_trait;
use scribe_core::{ContentItem, ExtractionResult, FailureKind, FileKind};
use std::path::Path;
use tracing::debug;

/// Reads `.txt` files as UTF-8.
pub struct TextExtractor;

#[async_trait]
impl Extractor for TextExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Text
    }

    async fn extract(&self, path: &Path) -> ExtractionResult {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return read_failure("txt", path, &e),
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                return ExtractionResult::failed(
                    FailureKind::Extraction,
                    format!("{} is not valid UTF-8: {}", path.display(), e.utf8_error()),
                )
                .with_metadata_defaults(base_metadata("txt", path));
            }
        };

        debug!("Read {} characters from {:?}", content.chars().count(), path);

        let mut metadata = base_metadata("txt", path);
        metadata.insert("encoding".to_string(), "utf-8".into());
        metadata.insert("lines".to_string(), content.lines().count().into());

        ExtractionResult::ok(vec![ContentItem::text(content)], metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_utf8_text() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        write!(file, "שלום עולם\nsecond line").unwrap();

        let result = TextExtractor.extract(file.path()).await;
        assert!(result.success);
        assert_eq!(result.content.len(), 1);
        assert!(result.content[0].content.starts_with("שלום"));
        assert_eq!(result.metadata["lines"], 2);
        assert_eq!(result.metadata["file_type"], "txt");
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let result = TextExtractor.extract(file.path()).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Extraction));
        assert!(result.error.unwrap().contains("UTF-8"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let result = TextExtractor.extract(Path::new("/nonexistent/a.txt")).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::NotFound));
        assert_eq!(result.metadata["file_type"], "txt");
    }
}
