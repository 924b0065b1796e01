//! Word document extractor.

use super::{base_metadata, read_failure, Extractor};
use async_trait::async_trait;
use scribe_core::{ContentItem, ExtractionResult, FailureKind, FileKind};
use std::path::Path;
use tracing::debug;

/// Concatenates the non-empty paragraphs of a `.docx` file.
///
/// Legacy binary `.doc` files are routed here too and fail to parse.
pub struct DocxExtractor;

/// Text of every non-empty paragraph, in document order.
fn paragraphs(data: &[u8]) -> Result<Vec<String>, String> {
    let doc = docx_rs::read_docx(data).map_err(|e| e.to_string())?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            let mut text = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }
    Ok(paragraphs)
}

#[async_trait]
impl Extractor for DocxExtractor {
    fn kind(&self) -> FileKind {
        FileKind::WordDoc
    }

    async fn extract(&self, path: &Path) -> ExtractionResult {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return read_failure("docx", path, &e),
        };

        let parsed = tokio::task::spawn_blocking(move || paragraphs(&bytes))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);

        match parsed {
            Ok(paragraphs) => {
                debug!("Extracted {} paragraphs from {:?}", paragraphs.len(), path);
                let mut metadata = base_metadata("docx", path);
                metadata.insert("paragraphs".to_string(), paragraphs.len().into());
                ExtractionResult::ok(vec![ContentItem::text(paragraphs.join("\n"))], metadata)
            }
            Err(e) => ExtractionResult::failed(
                FailureKind::Extraction,
                format!("Failed to read Word document {}: {}", path.display(), e),
            )
            .with_metadata_defaults(base_metadata("docx", path)),
        }
    }
}
