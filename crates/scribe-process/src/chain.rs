//! Ordered OCR fallback chain.

use crate::engine::{OcrEngine, OcrOutput, OcrTask};
use crate::error::{ProcessError, ProcessResult};
use crate::layout_ocr::OllamaLayoutOcr;
use crate::tesseract::TesseractOcr;
use scribe_config::Config;
use scribe_core::LayoutDocument;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of running an image through the chain.
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    pub text: String,
    /// Name of the engine that produced `text`.
    pub method: Option<String>,
    pub parsed: Option<LayoutDocument>,
    pub success: bool,
    /// Errors from engines that were tried and failed, even on success.
    pub error: Option<String>,
}

/// Tries each engine in order and stops at the first success.
pub struct OcrChain {
    engines: Vec<Arc<dyn OcrEngine>>,
    timeout: Option<Duration>,
    pub(crate) dpi: u32,
}

impl OcrChain {
    /// Create a chain; the first engine is the primary.
    pub fn new(engines: Vec<Arc<dyn OcrEngine>>) -> Self {
        Self {
            engines,
            timeout: None,
            dpi: 200,
        }
    }

    /// Bound each engine attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rasterization resolution for the PDF path.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Layout-aware Ollama engine first, Tesseract second.
    pub fn from_config(config: &Config) -> ProcessResult<Self> {
        let primary = OllamaLayoutOcr::from_config(&config.ocr, &config.ollama)?;
        let fallback = TesseractOcr::new(config.ocr.tesseract_lang.clone());

        Ok(Self::new(vec![Arc::new(primary), Arc::new(fallback)])
            .with_timeout(Duration::from_secs(config.ocr.timeout_seconds))
            .with_dpi(config.ocr.dpi))
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Initialize every available engine.
    ///
    /// An engine that fails to initialize is logged and left to report
    /// itself unavailable; the error is returned only when no engine at
    /// all can run.
    pub async fn initialize(&self) -> ProcessResult<()> {
        let mut errors = Vec::new();
        let mut ready = 0;

        for engine in &self.engines {
            if !engine.is_available() {
                errors.push(format!("{}: not available", engine.name()));
                continue;
            }
            match engine.initialize().await {
                Ok(()) => {
                    info!("OCR engine ready: {}", engine.name());
                    ready += 1;
                }
                Err(e) => {
                    warn!("OCR engine {} failed to initialize: {}", engine.name(), e);
                    errors.push(format!("{}: {}", engine.name(), e));
                }
            }
        }

        if ready == 0 {
            return Err(ProcessError::Unavailable(format!(
                "no OCR engine ({})",
                errors.join("; ")
            )));
        }
        Ok(())
    }

    /// Run OCR on an image, falling through engines until one succeeds.
    pub async fn extract(&self, image: &Path, task: OcrTask) -> OcrResult {
        let mut errors: Vec<String> = Vec::new();

        for engine in &self.engines {
            if !engine.is_available() {
                debug!("Skipping unavailable OCR engine {}", engine.name());
                errors.push(format!("{}: not available", engine.name()));
                continue;
            }

            match self.attempt(engine.as_ref(), image, task).await {
                Ok(OcrOutput { text, parsed }) => {
                    if !errors.is_empty() {
                        info!(
                            "OCR for {:?} fell back to {} ({})",
                            image,
                            engine.name(),
                            errors.join("; ")
                        );
                    }
                    return OcrResult {
                        text,
                        method: Some(engine.name().to_string()),
                        parsed,
                        success: true,
                        error: (!errors.is_empty()).then(|| errors.join("; ")),
                    };
                }
                Err(e) => {
                    warn!("OCR engine {} failed on {:?}: {}", engine.name(), image, e);
                    errors.push(format!("{}: {}", engine.name(), e));
                }
            }
        }

        OcrResult {
            success: false,
            error: Some(format!("all OCR engines failed: {}", errors.join("; "))),
            ..Default::default()
        }
    }

    /// Release engine memory, e.g. between batch waves.
    pub async fn cleanup_memory(&self) {
        for engine in &self.engines {
            engine.cleanup_memory().await;
        }
    }

    /// Memory figures from the first engine that reports any.
    pub async fn memory_usage(&self) -> Option<serde_json::Value> {
        for engine in &self.engines {
            if let Some(usage) = engine.memory_usage().await {
                return Some(usage);
            }
        }
        None
    }

    async fn attempt(
        &self,
        engine: &dyn OcrEngine,
        image: &Path,
        task: OcrTask,
    ) -> ProcessResult<OcrOutput> {
        match self.timeout {
            Some(limit) => engine.attempt_within(image, task, limit).await,
            None => engine.attempt(image, task).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine for chain tests.
    pub(crate) struct StubEngine {
        pub name: &'static str,
        pub available: bool,
        pub reply: Result<&'static str, &'static str>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
        pub cleanups: AtomicUsize,
    }

    impl StubEngine {
        pub fn ok(name: &'static str, text: &'static str) -> Self {
            Self {
                name,
                available: true,
                reply: Ok(text),
                delay: None,
                calls: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &'static str, error: &'static str) -> Self {
            Self {
                reply: Err(error),
                ..Self::ok(name, "")
            }
        }
    }

    #[async_trait]
    impl OcrEngine for StubEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn attempt(&self, _image: &Path, task: OcrTask) -> ProcessResult<OcrOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.reply {
                Ok(text) => Ok(OcrOutput {
                    text: text.to_string(),
                    parsed: if task.wants_layout() {
                        LayoutDocument::parse(text)
                    } else {
                        None
                    },
                }),
                Err(e) => Err(ProcessError::OcrError(e.to_string())),
            }
        }

        async fn cleanup_memory(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_primary_success() {
        let layout = r#"{"elements": [{"category": "Text", "text": "hello"}]}"#;
        let chain = OcrChain::new(vec![
            Arc::new(StubEngine::ok("primary", layout)),
            Arc::new(StubEngine::ok("fallback", "hello")),
        ]);

        let result = chain.extract(Path::new("a.png"), OcrTask::Full).await;
        assert!(result.success);
        assert_eq!(result.method.as_deref(), Some("primary"));
        assert_eq!(result.parsed.unwrap().elements.len(), 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_throws() {
        let fallback = Arc::new(StubEngine::ok("fallback", "plain text"));
        let chain = OcrChain::new(vec![
            Arc::new(StubEngine::failing("primary", "CUDA out of memory")),
            fallback.clone(),
        ]);

        let result = chain.extract(Path::new("a.png"), OcrTask::Full).await;
        assert!(result.success);
        assert_eq!(result.method.as_deref(), Some("fallback"));
        assert_eq!(result.text, "plain text");
        assert!(result.error.unwrap().contains("CUDA out of memory"));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_fail_names_both_errors() {
        let chain = OcrChain::new(vec![
            Arc::new(StubEngine::failing("primary", "model crashed")),
            Arc::new(StubEngine::failing("fallback", "tesseract missing")),
        ]);

        let result = chain.extract(Path::new("a.png"), OcrTask::Full).await;
        assert!(!result.success);
        assert!(result.method.is_none());
        let error = result.error.unwrap();
        assert!(error.contains("model crashed"));
        assert!(error.contains("tesseract missing"));
    }

    #[tokio::test]
    async fn test_unavailable_primary_is_skipped() {
        let primary = Arc::new(StubEngine {
            available: false,
            ..StubEngine::ok("primary", "never")
        });
        let chain = OcrChain::new(vec![
            primary.clone(),
            Arc::new(StubEngine::ok("fallback", "text")),
        ]);

        let result = chain.extract(Path::new("a.png"), OcrTask::Full).await;
        assert_eq!(result.method.as_deref(), Some("fallback"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparseable_layout_keeps_raw_text() {
        let chain = OcrChain::new(vec![Arc::new(StubEngine::ok("primary", "not json at all"))]);

        let result = chain.extract(Path::new("a.png"), OcrTask::Full).await;
        assert!(result.success);
        assert_eq!(result.text, "not json at all");
        assert!(result.parsed.is_none());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let slow = StubEngine {
            delay: Some(Duration::from_secs(5)),
            ..StubEngine::ok("primary", "late")
        };
        let chain = OcrChain::new(vec![
            Arc::new(slow),
            Arc::new(StubEngine::ok("fallback", "on time")),
        ])
        .with_timeout(Duration::from_millis(50));

        let result = chain.extract(Path::new("a.png"), OcrTask::OcrOnly).await;
        assert_eq!(result.method.as_deref(), Some("fallback"));
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_initialize_requires_one_engine() {
        let none = OcrChain::new(vec![Arc::new(StubEngine {
            available: false,
            ..StubEngine::ok("primary", "")
        })]);
        assert!(none.initialize().await.is_err());

        let one = OcrChain::new(vec![Arc::new(StubEngine::ok("fallback", ""))]);
        assert!(one.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_reaches_every_engine() {
        let a = Arc::new(StubEngine::ok("a", ""));
        let b = Arc::new(StubEngine::ok("b", ""));
        let chain = OcrChain::new(vec![a.clone(), b.clone()]);
        chain.cleanup_memory().await;
        assert_eq!(a.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(b.cleanups.load(Ordering::SeqCst), 1);
    }
}
