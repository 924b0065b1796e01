//! The OCR engine capability.

use crate::error::{ProcessError, ProcessResult};
use async_trait::async_trait;
use scribe_core::LayoutDocument;
use std::path::Path;
use std::time::Duration;

/// What an OCR call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrTask {
    /// Layout elements with category, bbox and text.
    #[default]
    Full,
    /// Layout elements with category and bbox only.
    LayoutOnly,
    /// Plain text, headers and footers excluded.
    OcrOnly,
}

impl OcrTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrTask::Full => "full",
            OcrTask::LayoutOnly => "layout_only",
            OcrTask::OcrOnly => "ocr_only",
        }
    }

    /// Whether the engine is expected to answer with layout JSON.
    pub fn wants_layout(&self) -> bool {
        !matches!(self, OcrTask::OcrOnly)
    }
}

/// Output of a successful engine attempt.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    /// Raw text as produced by the engine.
    pub text: String,
    /// Structured layout, when the engine produced parseable layout JSON.
    pub parsed: Option<LayoutDocument>,
}

/// A single OCR engine in the fallback chain.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Name recorded as the `method` of results this engine produces.
    fn name(&self) -> &str;

    /// Whether this engine can run in the current environment.
    fn is_available(&self) -> bool;

    /// Load whatever the engine needs. Errors here are reported once.
    async fn initialize(&self) -> ProcessResult<()> {
        Ok(())
    }

    /// Run OCR on one image.
    async fn attempt(&self, image: &Path, task: OcrTask) -> ProcessResult<OcrOutput>;

    /// Run one attempt bounded by `limit`. Engines that queue calls
    /// internally start the clock once their turn comes.
    async fn attempt_within(
        &self,
        image: &Path,
        task: OcrTask,
        limit: Duration,
    ) -> ProcessResult<OcrOutput> {
        tokio::time::timeout(limit, self.attempt(image, task))
            .await
            .map_err(|_| timed_out(self.name(), limit))?
    }

    /// Release memory held by the engine between batches.
    async fn cleanup_memory(&self) {}

    /// Engine-specific memory figures.
    async fn memory_usage(&self) -> Option<serde_json::Value> {
        None
    }
}

pub(crate) fn timed_out(engine: &str, limit: Duration) -> ProcessError {
    ProcessError::Timeout {
        what: format!("OCR engine {}", engine),
        seconds: limit.as_secs(),
    }
}
