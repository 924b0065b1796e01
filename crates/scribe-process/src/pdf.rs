//! Rasterize-and-OCR path for PDFs without a usable text layer.

use crate::chain::OcrChain;
use crate::engine::OcrTask;
use crate::error::{ProcessError, ProcessResult};
use crate::tool_command;
use scribe_core::LayoutDocument;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// OCR outcome for one PDF page.
#[derive(Debug, Clone)]
pub struct PdfPageOcr {
    /// 1-based page number.
    pub page: u32,
    pub success: bool,
    pub text: String,
    pub method: Option<String>,
    pub parsed: Option<LayoutDocument>,
    pub error: Option<String>,
}

/// OCR outcome for a whole PDF.
#[derive(Debug, Clone)]
pub struct PdfOcrResult {
    /// True when at least one page succeeded.
    pub success: bool,
    /// Page texts joined with `--- page N ---` separators.
    pub text: String,
    pub pages: Vec<PdfPageOcr>,
    pub total_pages: u32,
    pub successful_pages: u32,
    pub dpi: u32,
    pub error: Option<String>,
}

impl PdfOcrResult {
    pub fn error_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| !p.success)
            .map(|p| p.page)
            .collect()
    }

    fn failed(dpi: u32, error: String) -> Self {
        Self {
            success: false,
            text: String::new(),
            pages: Vec::new(),
            total_pages: 0,
            successful_pages: 0,
            dpi,
            error: Some(error),
        }
    }
}

/// Number of pages in a PDF.
pub async fn pdf_page_count(pdf: &Path) -> ProcessResult<u32> {
    let path = pdf.to_path_buf();
    tokio::task::spawn_blocking(move || {
        lopdf::Document::load(&path)
            .map(|doc| doc.get_pages().len() as u32)
            .map_err(|e| ProcessError::PdfError(format!("{}: {}", path.display(), e)))
    })
    .await
    .map_err(|e| ProcessError::PdfError(e.to_string()))?
}

/// Render one page to a temporary PNG. The file is removed when the
/// returned path is dropped.
async fn rasterize_page(pdf: &Path, page: u32, dpi: u32) -> ProcessResult<TempPath> {
    if which::which("pdftoppm").is_err() {
        return Err(ProcessError::ToolNotFound {
            tool: "pdftoppm".to_string(),
        });
    }

    let image = tempfile::Builder::new()
        .prefix("scribe-page-")
        .suffix(".png")
        .tempfile()?
        .into_temp_path();
    // pdftoppm appends the extension itself in -singlefile mode
    let prefix: PathBuf = image.with_extension("");

    let dpi_arg = dpi.to_string();
    let page_arg = page.to_string();
    let output = tool_command("pdftoppm")
        .args(["-r", dpi_arg.as_str()])
        .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
        .args(["-png", "-singlefile"])
        .arg(pdf)
        .arg(&prefix)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ProcessError::ProcessFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(image)
}

impl OcrChain {
    /// OCR every page of a PDF through the chain.
    ///
    /// Each page is rendered at the chain's DPI into a temporary image that
    /// is deleted as soon as the page is done, whatever the outcome. Page
    /// failures are recorded per page.
    pub async fn extract_pdf(&self, pdf: &Path, task: OcrTask) -> PdfOcrResult {
        let total_pages = match pdf_page_count(pdf).await {
            Ok(n) => n,
            Err(e) => return PdfOcrResult::failed(self.dpi, e.to_string()),
        };

        info!(
            "OCR of {:?}: {} pages at {} DPI",
            pdf, total_pages, self.dpi
        );

        let mut pages = Vec::with_capacity(total_pages as usize);
        for page in 1..=total_pages {
            pages.push(self.ocr_page(pdf, page, task).await);
        }

        let successful_pages = pages.iter().filter(|p| p.success).count() as u32;
        let text = pages
            .iter()
            .filter(|p| p.success && !p.text.is_empty())
            .map(|p| format!("--- page {} ---\n{}", p.page, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let error = if successful_pages == 0 {
            Some(if total_pages == 0 {
                "PDF has no pages".to_string()
            } else {
                format!("OCR failed on all {} pages", total_pages)
            })
        } else {
            None
        };

        PdfOcrResult {
            success: successful_pages > 0,
            text,
            pages,
            total_pages,
            successful_pages,
            dpi: self.dpi,
            error,
        }
    }

    async fn ocr_page(&self, pdf: &Path, page: u32, task: OcrTask) -> PdfPageOcr {
        let image = match rasterize_page(pdf, page, self.dpi).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not render page {} of {:?}: {}", page, pdf, e);
                return PdfPageOcr {
                    page,
                    success: false,
                    text: String::new(),
                    method: None,
                    parsed: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let result = self.extract(&image, task).await;
        if let Err(e) = image.close() {
            debug!("Could not remove page image: {}", e);
        }

        PdfPageOcr {
            page,
            success: result.success,
            text: result.text,
            method: result.method,
            parsed: result.parsed,
            error: result.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::StubEngine;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_page_count_of_missing_pdf() {
        let err = pdf_page_count(Path::new("/nonexistent/doc.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::PdfError(_)));
    }

    #[tokio::test]
    async fn test_unreadable_pdf_fails_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"not a pdf").unwrap();

        let chain = OcrChain::new(vec![Arc::new(StubEngine::ok("stub", "text"))]).with_dpi(150);
        let result = chain.extract_pdf(&pdf, OcrTask::OcrOnly).await;
        assert!(!result.success);
        assert_eq!(result.dpi, 150);
        assert!(result.pages.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_error_pages() {
        let page = |n: u32, ok: bool| PdfPageOcr {
            page: n,
            success: ok,
            text: String::new(),
            method: None,
            parsed: None,
            error: None,
        };
        let result = PdfOcrResult {
            success: true,
            text: String::new(),
            pages: vec![page(1, true), page(2, false), page(3, false)],
            total_pages: 3,
            successful_pages: 1,
            dpi: 200,
            error: None,
        };
        assert_eq!(result.error_pages(), vec![2, 3]);
    }
}
