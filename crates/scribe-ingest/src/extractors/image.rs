//! Image extractor backed by the OCR chain.

use super::{base_metadata, Extractor};
use async_trait::async_trait;
use scribe_core::{
    ContentItem, ContentType, ExtractionResult, FailureKind, FileKind, LayoutCategory,
    LayoutDocument, Metadata,
};
use scribe_process::{OcrChain, OcrTask};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Element counts of a parsed layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutCounts {
    pub layout_elements: usize,
    pub text_elements: usize,
    pub table_elements: usize,
    pub formula_elements: usize,
}

impl LayoutCounts {
    pub(crate) fn add(&mut self, other: LayoutCounts) {
        self.layout_elements += other.layout_elements;
        self.text_elements += other.text_elements;
        self.table_elements += other.table_elements;
        self.formula_elements += other.formula_elements;
    }

    pub(crate) fn write_to(&self, metadata: &mut Metadata) {
        metadata.insert("layout_elements".to_string(), self.layout_elements.into());
        metadata.insert("text_elements".to_string(), self.text_elements.into());
        metadata.insert("table_elements".to_string(), self.table_elements.into());
        metadata.insert("formula_elements".to_string(), self.formula_elements.into());
    }
}

/// Turn a parsed layout into content items.
///
/// Text-like elements are merged into one `text_block` that comes first;
/// each table and formula becomes its own item. Pictures are dropped.
pub fn layout_items(layout: &LayoutDocument) -> (Vec<ContentItem>, LayoutCounts) {
    let mut texts: Vec<&str> = Vec::new();
    let mut categories: Vec<&'static str> = Vec::new();
    let mut structured = Vec::new();
    let mut counts = LayoutCounts {
        layout_elements: layout.elements.len(),
        ..Default::default()
    };

    for element in &layout.elements {
        match element.category {
            LayoutCategory::Picture => {}
            LayoutCategory::Table | LayoutCategory::Formula => {
                let (kind, count) = if element.category == LayoutCategory::Table {
                    (ContentType::Table, &mut counts.table_elements)
                } else {
                    (ContentType::Formula, &mut counts.formula_elements)
                };
                *count += 1;
                structured.push(
                    ContentItem::new(kind, element.text())
                        .with_bbox(element.bbox)
                        .with_meta("category", element.category.as_str()),
                );
            }
            category => {
                counts.text_elements += 1;
                if !categories.contains(&category.as_str()) {
                    categories.push(category.as_str());
                }
                let text = element.text();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }
    }

    let mut items = Vec::with_capacity(structured.len() + 1);
    if counts.text_elements > 0 {
        items.push(
            ContentItem::new(ContentType::TextBlock, texts.join("\n"))
                .with_meta("element_count", counts.text_elements)
                .with_meta("categories", categories),
        );
    }
    items.extend(structured);
    (items, counts)
}

/// Runs images through the OCR chain in `full` mode.
pub struct ImageExtractor {
    ocr: Option<Arc<OcrChain>>,
}

impl ImageExtractor {
    pub fn new(ocr: Option<Arc<OcrChain>>) -> Self {
        Self { ocr }
    }
}

#[async_trait]
impl Extractor for ImageExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Image
    }

    async fn extract(&self, path: &Path) -> ExtractionResult {
        let mut metadata = base_metadata("image", path);

        if !path.exists() {
            return ExtractionResult::failed(
                FailureKind::NotFound,
                format!("File not found: {}", path.display()),
            )
            .with_metadata_defaults(metadata);
        }

        let Some(ocr) = &self.ocr else {
            return ExtractionResult::failed(FailureKind::Ocr, "OCR is not configured")
                .with_metadata_defaults(metadata);
        };

        let result = ocr.extract(path, OcrTask::Full).await;
        metadata.insert(
            "ocr_method".to_string(),
            result.method.as_deref().unwrap_or("unknown").into(),
        );
        metadata.insert("has_layout_info".to_string(), result.parsed.is_some().into());

        if !result.success {
            return ExtractionResult::failed(
                FailureKind::Ocr,
                result.error.unwrap_or_else(|| "OCR failed".to_string()),
            )
            .with_metadata_defaults(metadata);
        }

        let mut items = Vec::new();
        if let Some(layout) = &result.parsed {
            let (layout_content, counts) = layout_items(layout);
            counts.write_to(&mut metadata);
            items = layout_content;
        }
        if let Some(reason) = result.error {
            metadata.insert("ocr_fallback_reason".to_string(), reason.into());
        }
        if items.is_empty() {
            items.push(
                ContentItem::new(ContentType::RawText, result.text).with_meta("source", "ocr_raw"),
            );
        }

        debug!("Image {:?} produced {} content items", path, items.len());
        ExtractionResult::ok(items, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubOcr;

    fn chain(engines: Vec<StubOcr>) -> Option<Arc<OcrChain>> {
        Some(Arc::new(OcrChain::new(
            engines
                .into_iter()
                .map(|e| Arc::new(e) as Arc<dyn scribe_process::OcrEngine>)
                .collect(),
        )))
    }

    fn image() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        std::fs::write(file.path(), b"\x89PNG").unwrap();
        file
    }

    #[test]
    fn test_layout_items_grouping() {
        let layout = LayoutDocument::parse(
            r#"{"elements": [
                {"category": "Title", "text": "Report", "bbox": [0, 0, 10, 2]},
                {"category": "Picture", "bbox": [0, 2, 10, 8]},
                {"category": "Table", "text": "<table><tr><td>1</td></tr></table>", "bbox": [0, 8, 10, 12]},
                {"category": "Text", "text": "Body"},
                {"category": "Formula", "text": "E=mc^2"},
                {"category": "Text", "text": "More"}
            ]}"#,
        )
        .unwrap();

        let (items, counts) = layout_items(&layout);
        assert_eq!(
            counts,
            LayoutCounts {
                layout_elements: 6,
                text_elements: 3,
                table_elements: 1,
                formula_elements: 1,
            }
        );
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, ContentType::TextBlock);
        assert_eq!(items[0].content, "Report\nBody\nMore");
        assert_eq!(items[0].metadata["categories"], serde_json::json!(["Title", "Text"]));
        assert_eq!(items[1].kind, ContentType::Table);
        assert_eq!(items[1].bbox, Some([0.0, 8.0, 10.0, 12.0]));
        assert_eq!(items[2].kind, ContentType::Formula);
    }

    #[tokio::test]
    async fn test_table_image_yields_table_item() {
        let file = image();
        let layout = r#"{"elements": [{"category": "Table", "text": "<table></table>"}]}"#;
        let extractor = ImageExtractor::new(chain(vec![StubOcr::ok("layout_vlm", layout)]));

        let result = extractor.extract(file.path()).await;
        assert!(result.success);
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0].kind, ContentType::Table);
        assert_eq!(result.metadata["ocr_method"], "layout_vlm");
        assert_eq!(result.metadata["has_layout_info"], true);
        assert_eq!(result.metadata["table_elements"], 1);
    }

    #[tokio::test]
    async fn test_unparsed_output_keeps_raw_text() {
        let file = image();
        let extractor = ImageExtractor::new(chain(vec![
            StubOcr::failing("layout_vlm", "model crashed"),
            StubOcr::ok("tesseract", "plain words"),
        ]));

        let result = extractor.extract(file.path()).await;
        assert!(result.success);
        assert_eq!(result.content[0].kind, ContentType::RawText);
        assert_eq!(result.content[0].content, "plain words");
        assert_eq!(result.content[0].metadata["source"], "ocr_raw");
        assert_eq!(result.metadata["ocr_method"], "tesseract");
        assert_eq!(result.metadata["has_layout_info"], false);
    }

    #[tokio::test]
    async fn test_both_engines_failing_is_ocr_failure() {
        let file = image();
        let extractor = ImageExtractor::new(chain(vec![
            StubOcr::failing("layout_vlm", "out of memory"),
            StubOcr::failing("tesseract", "no such language"),
        ]));

        let result = extractor.extract(file.path()).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Ocr));
        let error = result.error.unwrap();
        assert!(error.contains("out of memory"));
        assert!(error.contains("no such language"));
    }

    #[tokio::test]
    async fn test_no_ocr_configured() {
        let file = image();
        let result = ImageExtractor::new(None).extract(file.path()).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Ocr));
    }
}
