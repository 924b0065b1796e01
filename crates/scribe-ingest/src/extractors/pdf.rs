//! PDF extractor: text layer first, page-by-page fallback, OCR for scans.

use super::image::{layout_items, LayoutCounts};
use super::{base_metadata, read_failure, Extractor};
use async_trait::async_trait;
use scribe_core::{ContentItem, ContentType, ExtractionResult, FailureKind, FileKind, Metadata};
use scribe_process::{OcrChain, OcrTask, PdfOcrResult, PdfPageOcr};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page texts, 1-based page numbers, every page of the document.
type Pages = Vec<(u32, String)>;

pub struct PdfExtractor {
    ocr: Option<Arc<OcrChain>>,
    scanned_min_chars: usize,
}

impl PdfExtractor {
    pub fn new(ocr: Option<Arc<OcrChain>>) -> Self {
        Self {
            ocr,
            scanned_min_chars: 50,
        }
    }

    /// Average characters per page below which a PDF counts as scanned.
    pub fn with_scanned_threshold(mut self, min_chars: usize) -> Self {
        self.scanned_min_chars = min_chars;
        self
    }

    fn looks_scanned(&self, pages: &Pages) -> bool {
        if pages.is_empty() {
            return true;
        }
        let chars: usize = pages.iter().map(|(_, t)| t.trim().chars().count()).sum();
        chars / pages.len() < self.scanned_min_chars
    }
}

/// Rich extraction through `pdf-extract`, one string per page.
async fn text_layer(bytes: Arc<Vec<u8>>) -> Result<Pages, String> {
    tokio::task::spawn_blocking(move || -> Result<Pages, String> {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map(|pages| {
                pages
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| (i as u32 + 1, text))
                    .collect()
            })
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("text layer extraction aborted: {}", e))?
}

/// Simpler per-page extraction straight from the content streams.
async fn page_fallback(bytes: Arc<Vec<u8>>) -> Result<Pages, String> {
    tokio::task::spawn_blocking(move || -> Result<Pages, String> {
        let doc = lopdf::Document::load_mem(&bytes).map_err(|e| e.to_string())?;
        let pages: Pages = doc
            .get_pages()
            .into_keys()
            .map(|number| {
                let text = doc.extract_text(&[number]).unwrap_or_else(|e| {
                    debug!("No text on page {}: {}", number, e);
                    String::new()
                });
                (number, text)
            })
            .collect();
        Ok(pages)
    })
    .await
    .map_err(|e| format!("page extraction aborted: {}", e))?
}

fn page_items(pages: &Pages) -> Vec<ContentItem> {
    pages
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| ContentItem::text(text.clone()).with_meta("page", *page))
        .collect()
}

/// OCR content for one page, empty when the page failed or had no text.
fn ocr_page_items(
    page: &PdfPageOcr,
    counts: &mut LayoutCounts,
    has_layout: &mut bool,
) -> Vec<ContentItem> {
    if !page.success {
        return Vec::new();
    }
    let mut content = Vec::new();
    if let Some(layout) = &page.parsed {
        *has_layout = true;
        let (layout_content, page_counts) = layout_items(layout);
        counts.add(page_counts);
        content = layout_content;
    }
    if content.is_empty() && !page.text.trim().is_empty() {
        content.push(
            ContentItem::new(ContentType::RawText, page.text.clone())
                .with_meta("source", "ocr_raw"),
        );
    }
    content
}

/// Merge a rasterize-and-OCR pass into the text layer. A page keeps its
/// text layer when it has one; blank pages take the OCR output.
fn merged_items(
    pages: &Pages,
    result: &PdfOcrResult,
    metadata: &mut Metadata,
) -> Vec<ContentItem> {
    let layer: BTreeMap<u32, &str> = pages
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| (*page, text.as_str()))
        .collect();
    let ocr: BTreeMap<u32, &PdfPageOcr> = result.pages.iter().map(|p| (p.page, p)).collect();
    let numbers: BTreeSet<u32> = pages
        .iter()
        .map(|(page, _)| *page)
        .chain(ocr.keys().copied())
        .collect();

    let mut items = Vec::new();
    let mut counts = LayoutCounts::default();
    let mut has_layout = false;
    let mut ocr_pages = 0usize;

    for number in numbers {
        if let Some(text) = layer.get(&number) {
            items.push(ContentItem::text(text.to_string()).with_meta("page", number));
            continue;
        }
        let Some(page) = ocr.get(&number) else {
            continue;
        };
        let content = ocr_page_items(page, &mut counts, &mut has_layout);
        if !content.is_empty() {
            ocr_pages += 1;
        }
        items.extend(content.into_iter().map(|item| item.with_meta("page", number)));
    }

    metadata.insert("ocr_enhanced".to_string(), (ocr_pages > 0).into());
    metadata.insert("ocr_pages".to_string(), ocr_pages.into());
    metadata.insert("has_layout_info".to_string(), has_layout.into());
    if has_layout {
        counts.write_to(metadata);
    }
    if let Some(method) = result.pages.iter().find_map(|p| p.method.as_deref()) {
        metadata.insert("ocr_method".to_string(), method.into());
    }
    metadata.insert("successful_pages".to_string(), result.successful_pages.into());
    metadata.insert("total_pages".to_string(), result.total_pages.into());
    metadata.insert("dpi_used".to_string(), result.dpi.into());
    let error_pages = result.error_pages();
    if !error_pages.is_empty() {
        metadata.insert("error_pages".to_string(), error_pages.into());
    }
    items
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn kind(&self) -> FileKind {
        FileKind::Pdf
    }

    async fn extract(&self, path: &Path) -> ExtractionResult {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => return read_failure("pdf", path, &e),
        };

        let mut metadata = base_metadata("pdf", path);

        let (pages, method) = match text_layer(bytes.clone()).await {
            Ok(pages) => (pages, "text_layer"),
            Err(rich_error) => {
                warn!(
                    "Text layer extraction failed for {:?}, trying page fallback: {}",
                    path, rich_error
                );
                match page_fallback(bytes).await {
                    Ok(pages) => (pages, "page_fallback"),
                    Err(fallback_error) => {
                        return ExtractionResult::failed(
                            FailureKind::Extraction,
                            format!(
                                "Failed to extract PDF text: {}; fallback: {}",
                                rich_error, fallback_error
                            ),
                        )
                        .with_metadata_defaults(metadata);
                    }
                }
            }
        };

        metadata.insert("pages".to_string(), pages.len().into());
        metadata.insert("extraction_method".to_string(), method.into());

        if let Some(ocr) = &self.ocr {
            if self.looks_scanned(&pages) {
                info!("{:?} has little or no text layer, running OCR", path);
                let result = ocr.extract_pdf(path, OcrTask::Full).await;
                if result.success {
                    let items = merged_items(&pages, &result, &mut metadata);
                    return ExtractionResult::ok(items, metadata);
                }
                warn!(
                    "OCR of scanned PDF {:?} failed, keeping text layer: {}",
                    path,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        let items = page_items(&pages);
        debug!(
            "Extracted {} non-empty pages of {} from {:?}",
            items.len(),
            pages.len(),
            path
        );
        ExtractionResult::ok(items, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stub_chain, write_pdf, StubOcr};

    #[test]
    fn test_page_items_skip_blank_pages() {
        let pages = vec![
            (1, "Intro".to_string()),
            (2, "   \n".to_string()),
            (3, "Outro".to_string()),
        ];
        let items = page_items(&pages);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].metadata["page"], 3);
    }

    #[test]
    fn test_scanned_detection() {
        let extractor = PdfExtractor::new(None).with_scanned_threshold(10);
        assert!(extractor.looks_scanned(&vec![]));
        assert!(extractor.looks_scanned(&vec![(1, "abc".to_string()), (2, String::new())]));
        assert!(!extractor.looks_scanned(&vec![(1, "a long enough page".to_string())]));
    }

    fn ocr_page(n: u32, ok: bool, text: &str) -> PdfPageOcr {
        PdfPageOcr {
            page: n,
            success: ok,
            text: text.to_string(),
            method: ok.then(|| "tesseract".to_string()),
            parsed: None,
            error: (!ok).then(|| "boom".to_string()),
        }
    }

    fn ocr_result(pages: Vec<PdfPageOcr>) -> PdfOcrResult {
        let successful_pages = pages.iter().filter(|p| p.success).count() as u32;
        PdfOcrResult {
            success: successful_pages > 0,
            text: String::new(),
            total_pages: pages.len() as u32,
            pages,
            successful_pages,
            dpi: 200,
            error: None,
        }
    }

    #[test]
    fn test_blank_pages_take_ocr_output() {
        let pages = vec![(1, String::new()), (2, " ".to_string())];
        let result = ocr_result(vec![ocr_page(1, true, "scanned words"), ocr_page(2, false, "")]);

        let mut metadata = Metadata::new();
        let items = merged_items(&pages, &result, &mut metadata);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, ContentType::RawText);
        assert_eq!(items[0].metadata["page"], 1);
        assert_eq!(metadata["ocr_enhanced"], true);
        assert_eq!(metadata["ocr_method"], "tesseract");
        assert_eq!(metadata["dpi_used"], 200);
        assert_eq!(metadata["error_pages"], serde_json::json!([2]));
    }

    #[test]
    fn test_text_layer_wins_over_ocr() {
        let pages = vec![(1, "Short cover page".to_string()), (2, String::new())];
        let result = ocr_result(vec![
            ocr_page(1, true, "Sh0rt c0ver page"),
            ocr_page(2, true, "Scanned appendix"),
        ]);

        let mut metadata = Metadata::new();
        let items = merged_items(&pages, &result, &mut metadata);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ContentType::Text);
        assert_eq!(items[0].content, "Short cover page");
        assert_eq!(items[1].content, "Scanned appendix");
        assert_eq!(items[1].metadata["page"], 2);
        assert_eq!(metadata["ocr_pages"], 1);
    }

    #[test]
    fn test_full_text_layer_is_not_ocr_enhanced() {
        let pages = vec![(1, "Intro".to_string()), (2, "Outro".to_string())];
        let result = ocr_result(vec![ocr_page(1, true, "x"), ocr_page(2, true, "y")]);

        let mut metadata = Metadata::new();
        let items = merged_items(&pages, &result, &mut metadata);
        assert_eq!(items.len(), 2);
        assert_eq!(metadata["ocr_enhanced"], false);
    }

    #[tokio::test]
    async fn test_text_layer_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf(
            &path,
            &["First page of the quarterly report", "Second page with the revenue numbers"],
        );

        let result = PdfExtractor::new(None).extract(&path).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.metadata["pages"], 2);
        assert_eq!(result.metadata["extraction_method"], "text_layer");
        let text: String = result.content.iter().map(|i| i.content.as_str()).collect();
        assert!(text.contains("First page of the quarterly report"));
        assert!(text.contains("Second page with the revenue numbers"));
    }

    #[tokio::test]
    async fn test_page_fallback_reads_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf(&path, &["Alpha page", "Beta page"]);

        let bytes = Arc::new(std::fs::read(&path).unwrap());
        let pages = page_fallback(bytes).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].0, 1);
        assert!(pages[0].1.contains("Alpha page"));
        assert!(pages[1].1.contains("Beta page"));
    }

    #[tokio::test]
    async fn test_short_text_layer_survives_configured_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.pdf");
        write_pdf(&path, &["Tiny", "Also tiny"]);

        let chain = stub_chain(vec![Arc::new(StubOcr::ok("stub", "ocr guess"))]);
        let result = PdfExtractor::new(Some(chain)).extract(&path).await;
        assert!(result.success);
        let text: Vec<&str> = result.content.iter().map(|i| i.content.trim()).collect();
        assert!(text.iter().any(|t| t.contains("Tiny")));
        assert!(text.iter().any(|t| t.contains("Also tiny")));
        assert!(!text.contains(&"ocr guess"));
    }

    #[tokio::test]
    async fn test_garbage_pdf_fails_both_methods() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        let result = PdfExtractor::new(None).extract(&path).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Extraction));
        assert!(result.error.unwrap().contains("fallback"));
        assert_eq!(result.metadata["file_type"], "pdf");
    }
}
