//! Layout-aware OCR through an Ollama vision model.
//!
//! The model receives the page image and a task prompt and answers with a
//! JSON layout (`full`, `layout_only`) or plain text (`ocr_only`). The model
//! handle is a single shared resource, so calls are serialized through an
//! async mutex instead of being issued concurrently.

use crate::engine::{timed_out, OcrEngine, OcrOutput, OcrTask};
use crate::error::{ProcessError, ProcessResult};
use async_trait::async_trait;
use base64::Engine as _;
use scribe_config::{OcrConfig, OllamaConfig};
use scribe_core::{LayoutCategory, LayoutDocument};
use scribe_ollama::{GenerateOptions, GenerateRequest, OllamaClient};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Primary OCR engine backed by a vision model served by Ollama.
pub struct OllamaLayoutOcr {
    client: OllamaClient,
    model: String,
    enabled: bool,
    initialized: AtomicBool,
    failed: AtomicBool,
    queue: Mutex<()>,
}

impl OllamaLayoutOcr {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            enabled: true,
            initialized: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            queue: Mutex::new(()),
        }
    }

    /// Build from config. The client uses the OCR timeout, not the
    /// shorter embedding timeout.
    pub fn from_config(ocr: &OcrConfig, ollama: &OllamaConfig) -> ProcessResult<Self> {
        let client =
            OllamaClient::with_timeout(&ollama.host, Duration::from_secs(ocr.timeout_seconds))?;
        let mut engine = Self::new(client, ocr.layout_model.clone());
        engine.enabled = ocr.primary_enabled;
        Ok(engine)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One model call. `limit` bounds the call itself, not the wait for the
    /// model's turn.
    async fn run(
        &self,
        image: &Path,
        task: OcrTask,
        limit: Option<Duration>,
    ) -> ProcessResult<OcrOutput> {
        if !self.is_available() {
            return Err(ProcessError::Unavailable(format!("layout OCR ({})", self.model)));
        }
        self.ensure_initialized().await?;

        let bytes = tokio::fs::read(image).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::FileNotFound(image.to_path_buf()),
            _ => ProcessError::Io(e),
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let mut request = GenerateRequest::new(&self.model, prompt_for(task))
            .with_image(encoded)
            .with_options(GenerateOptions::new().with_temperature(0.0));
        if task.wants_layout() {
            request = request.with_json_format();
        }

        let turn = self.queue.lock().await;
        debug!("Layout OCR ({}) on {:?}", task.as_str(), image);
        let response = match limit {
            Some(limit) => tokio::time::timeout(limit, self.client.generate(request))
                .await
                .map_err(|_| timed_out(self.name(), limit))??,
            None => self.client.generate(request).await?,
        };
        drop(turn);

        let text = response.response.trim().to_string();
        if text.is_empty() {
            return Err(ProcessError::OcrError(format!(
                "{} returned no text",
                self.model
            )));
        }

        let parsed = if task.wants_layout() {
            let parsed = LayoutDocument::parse(&text);
            if parsed.is_none() {
                warn!("Layout OCR output for {:?} is not valid JSON", image);
            }
            parsed
        } else {
            None
        };

        Ok(OcrOutput { text, parsed })
    }

    async fn ensure_initialized(&self) -> ProcessResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.initialize().await
    }
}

#[async_trait]
impl OcrEngine for OllamaLayoutOcr {
    fn name(&self) -> &str {
        "layout_vlm"
    }

    fn is_available(&self) -> bool {
        self.enabled && !self.failed.load(Ordering::Acquire)
    }

    async fn initialize(&self) -> ProcessResult<()> {
        if !self.enabled {
            return Err(ProcessError::Unavailable(format!(
                "layout OCR ({}) is disabled",
                self.model
            )));
        }

        info!("Initializing layout OCR model {}", self.model);
        let result = match self.client.has_model(&self.model).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProcessError::Ollama(
                scribe_ollama::OllamaError::ModelNotFound {
                    model: self.model.clone(),
                },
            )),
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(()) => {
                self.initialized.store(true, Ordering::Release);
                self.failed.store(false, Ordering::Release);
            }
            Err(e) => {
                warn!("Layout OCR unavailable: {}", e);
                self.failed.store(true, Ordering::Release);
            }
        }
        result
    }

    async fn attempt(&self, image: &Path, task: OcrTask) -> ProcessResult<OcrOutput> {
        self.run(image, task, None).await
    }

    async fn attempt_within(
        &self,
        image: &Path,
        task: OcrTask,
        limit: Duration,
    ) -> ProcessResult<OcrOutput> {
        self.run(image, task, Some(limit)).await
    }

    async fn cleanup_memory(&self) {
        if !self.initialized.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.client.unload(&self.model).await {
            debug!("Could not unload {}: {}", self.model, e);
        }
    }

    async fn memory_usage(&self) -> Option<serde_json::Value> {
        let running = self.client.running_models().await.ok()?;
        let loaded = running
            .iter()
            .find(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model)));

        Some(match loaded {
            Some(m) => serde_json::json!({
                "engine": self.name(),
                "model": self.model,
                "loaded": true,
                "size_gb": bytes_to_gb(m.size),
                "vram_gb": bytes_to_gb(m.size_vram),
            }),
            None => serde_json::json!({
                "engine": self.name(),
                "model": self.model,
                "loaded": false,
            }),
        })
    }
}

fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / 1024f64.powi(3)
}

fn category_list() -> String {
    let names: Vec<String> = LayoutCategory::VOCABULARY
        .iter()
        .map(|c| format!("'{}'", c.as_str()))
        .collect();
    format!("[{}]", names.join(", "))
}

/// Prompt for a task. Layout prompts enumerate the category vocabulary.
pub(crate) fn prompt_for(task: OcrTask) -> String {
    match task {
        OcrTask::LayoutOnly => format!(
            "Output the layout of this document image: every layout element's bbox and category.\n\
             \n\
             1. Bbox format: [x1, y1, x2, y2]\n\
             2. Categories: {}\n\
             3. Elements must be listed in human reading order.\n\
             4. Answer with a single JSON object of the form {{\"elements\": [{{\"category\": ..., \"bbox\": ...}}]}}.",
            category_list()
        ),
        OcrTask::OcrOnly => "Extract all text from this document image, leaving out page headers and page footers.\n\
             \n\
             1. Include body text, titles, captions, footnotes and list items.\n\
             2. Format tables as HTML.\n\
             3. Format formulas as LaTeX.\n\
             4. Keep the original language. Do not translate.\n\
             5. Answer with the extracted text only."
            .to_string(),
        OcrTask::Full => format!(
            "Output the layout of this document image: every layout element's bbox, category and the text inside the bbox.\n\
             \n\
             1. Bbox format: [x1, y1, x2, y2]\n\
             2. Categories: {}\n\
             3. Text formatting:\n\
             \x20  - Picture: omit the text field.\n\
             \x20  - Formula: LaTeX.\n\
             \x20  - Table: HTML.\n\
             \x20  - Everything else: Markdown.\n\
             4. Keep the original language. Do not translate.\n\
             5. Elements must be listed in human reading order.\n\
             6. Answer with a single JSON object of the form {{\"elements\": [{{\"category\": ..., \"bbox\": ..., \"text\": ...}}]}}.",
            category_list()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(enabled: bool) -> OllamaLayoutOcr {
        let ocr = OcrConfig {
            primary_enabled: enabled,
            ..OcrConfig::default()
        };
        OllamaLayoutOcr::from_config(&ocr, &OllamaConfig::default()).unwrap()
    }

    #[test]
    fn test_prompts_name_vocabulary() {
        let full = prompt_for(OcrTask::Full);
        assert!(full.contains("'Section-header'"));
        assert!(full.contains("Table: HTML"));
        assert!(full.contains("Formula: LaTeX"));
        assert!(prompt_for(OcrTask::LayoutOnly).contains("'Page-footer'"));
        assert!(!prompt_for(OcrTask::OcrOnly).contains("JSON"));
    }

    #[test]
    fn test_disabled_engine_is_unavailable() {
        assert!(!engine(false).is_available());
        assert!(engine(true).is_available());
    }

    #[tokio::test]
    async fn test_disabled_engine_refuses_attempt() {
        let err = engine(false)
            .attempt(Path::new("scan.png"), OcrTask::Full)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_initialize_marks_unavailable() {
        let client =
            OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let engine = OllamaLayoutOcr::new(client, "some-vlm");
        assert!(engine.initialize().await.is_err());
        assert!(!engine.is_available());
    }

    #[tokio::test]
    async fn test_queue_wait_does_not_count_against_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("scan.png");
        std::fs::write(&image, b"png").unwrap();

        let client =
            OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let engine = std::sync::Arc::new(OllamaLayoutOcr::new(client, "some-vlm"));
        engine.initialized.store(true, Ordering::Release);

        let turn = engine.queue.lock().await;
        let queued = {
            let engine = engine.clone();
            let image = image.clone();
            tokio::spawn(async move {
                engine
                    .attempt_within(&image, OcrTask::OcrOnly, Duration::from_millis(100))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(turn);

        let err = queued.await.unwrap().unwrap_err();
        assert!(!matches!(err, ProcessError::Timeout { .. }), "{}", err);
    }
}
