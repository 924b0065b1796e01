//! Plain OCR using the Tesseract CLI.

use crate::engine::{OcrEngine, OcrOutput, OcrTask};
use crate::error::{ProcessError, ProcessResult};
use crate::tool_command;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Fallback OCR engine: Tesseract, text only.
pub struct TesseractOcr {
    lang: String,
}

impl TesseractOcr {
    /// Create an engine for the given Tesseract language spec, e.g. `heb+eng`.
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("heb+eng")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        which::which("tesseract").is_ok()
    }

    async fn attempt(&self, image: &Path, _task: OcrTask) -> ProcessResult<OcrOutput> {
        if !image.exists() {
            return Err(ProcessError::FileNotFound(image.to_path_buf()));
        }

        if !self.is_available() {
            return Err(ProcessError::ToolNotFound {
                tool: "tesseract".to_string(),
            });
        }

        debug!("Running Tesseract ({}) on {:?}", self.lang, image);

        let output = tool_command("tesseract")
            .arg(image)
            .arg("stdout") // Output to stdout instead of file
            .args(["--oem", "3"]) // LSTM + legacy engine
            .args(["--psm", "6"]) // Assume uniform block of text
            .args(["-l", self.lang.as_str()])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Tesseract sometimes outputs warnings to stderr but still works
            if output.stdout.is_empty() {
                return Err(ProcessError::ProcessFailed {
                    code: output.status.code().unwrap_or(-1),
                    stderr: stderr.trim().to_string(),
                });
            }
            debug!("Tesseract warning: {}", stderr);
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();

        Ok(OcrOutput { text, parsed: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_default_lang() {
        let engine = TesseractOcr::default();
        assert_eq!(engine.name(), "tesseract");
        assert_eq!(engine.lang, "heb+eng");
    }

    #[tokio::test]
    async fn test_missing_image() {
        let engine = TesseractOcr::new("eng");
        let err = engine
            .attempt(Path::new("/nonexistent/scan.png"), OcrTask::OcrOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::FileNotFound(_)));
    }
}
