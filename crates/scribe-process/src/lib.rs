//! Scribe Process - OCR and transcription collaborators.
//!
//! This crate provides:
//! - Layout-aware OCR through an Ollama vision model (primary engine)
//! - Plain OCR via the Tesseract CLI (fallback engine)
//! - An ordered OCR fallback chain, including a rasterize-and-OCR path for PDFs
//! - Audio transcription via the Whisper CLI
//!
//! The CLI-backed pieces rely on external tools being installed on the system.

mod chain;
mod engine;
mod error;
mod layout_ocr;
mod pdf;
mod tesseract;
mod transcribe;

pub use chain::{OcrChain, OcrResult};
pub use engine::{OcrEngine, OcrOutput, OcrTask};
pub use error::{ProcessError, ProcessResult};
pub use layout_ocr::OllamaLayoutOcr;
pub use pdf::{pdf_page_count, PdfOcrResult, PdfPageOcr};
pub use tesseract::TesseractOcr;
pub use transcribe::{Transcriber, TranscriptSegment, TranscriptionResult, WhisperTranscriber};

/// Check if the external tools used by this crate are available.
pub fn check_dependencies() -> Vec<(&'static str, bool)> {
    vec![
        ("tesseract", which::which("tesseract").is_ok()),
        ("pdftoppm", which::which("pdftoppm").is_ok()),
        ("whisper", which::which("whisper").is_ok()),
    ]
}

/// Command for an external tool. The child is killed if the call is
/// dropped, e.g. when an attempt times out.
pub(crate) fn tool_command(program: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(program);
    command.kill_on_drop(true);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_tool_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("sleep 1; touch '{}'", marker.display());

        let mut command = tool_command("sh");
        command.args(["-c", script.as_str()]);
        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_millis(100), command.output()).await;
        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }
}
