//! Audio transcription using Whisper.

use crate::error::{ProcessError, ProcessResult};
use crate::tool_command;
use async_trait::async_trait;
use scribe_config::TranscriptionConfig;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A segment of transcribed audio.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// The transcribed text.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

/// Outcome of one transcription.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionResult {
    pub success: bool,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: Option<String>,
    pub error: Option<String>,
}

impl TranscriptionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn from_segments(segments: Vec<TranscriptSegment>, language: Option<String>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            success: true,
            text,
            segments,
            language,
            error: None,
        }
    }
}

/// Speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Name recorded as the transcription method.
    fn name(&self) -> &str;

    fn is_initialized(&self) -> bool;

    /// Prepare the backend. Fails when it cannot run here.
    async fn initialize(&self) -> ProcessResult<()>;

    async fn transcribe(&self, audio: &Path) -> TranscriptionResult;
}

#[derive(Debug, Deserialize)]
struct WhisperJsonOutput {
    #[serde(default)]
    language: Option<String>,
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    text: String,
    start: f64,
    end: f64,
}

/// Transcriber that shells out to the `whisper` CLI.
///
/// Requires the `whisper` CLI to be installed (pip install openai-whisper).
pub struct WhisperTranscriber {
    model: String,
    language: Option<String>,
    enabled: bool,
    timeout: Duration,
    initialized: AtomicBool,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language: None,
            enabled: true,
            timeout: Duration::from_secs(1800),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            model: config.whisper_model.clone(),
            language: config.language.clone(),
            enabled: config.enabled,
            timeout: Duration::from_secs(config.timeout_seconds),
            initialized: AtomicBool::new(false),
        }
    }

    async fn run_whisper(&self, audio: &Path) -> ProcessResult<TranscriptionResult> {
        let output_dir = tempfile::tempdir()?;

        let mut command = tool_command("whisper");
        command
            .arg(audio)
            .args(["--model", self.model.as_str()])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(output_dir.path());
        if let Some(language) = &self.language {
            command.args(["--language", language.as_str()]);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ProcessError::Timeout {
                what: "Whisper transcription".to_string(),
                seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(ProcessError::TranscriptionError(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        // Find the output JSON file
        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let json_path = output_dir.path().join(format!("{}.json", stem));

        let json_content = tokio::fs::read_to_string(&json_path).await.map_err(|_| {
            ProcessError::TranscriptionError("Whisper output file not found".to_string())
        })?;
        let whisper_output: WhisperJsonOutput = serde_json::from_str(&json_content)
            .map_err(|e| ProcessError::ParseError(format!("Failed to parse Whisper output: {}", e)))?;

        let segments: Vec<TranscriptSegment> = whisper_output
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text.trim().to_string(),
                start: s.start,
                end: s.end,
            })
            .collect();

        debug!("Transcribed {} segments", segments.len());
        Ok(TranscriptionResult::from_segments(
            segments,
            whisper_output.language.or_else(|| self.language.clone()),
        ))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn initialize(&self) -> ProcessResult<()> {
        if !self.enabled {
            return Err(ProcessError::Unavailable("transcription (disabled)".to_string()));
        }
        if which::which("whisper").is_err() {
            return Err(ProcessError::ToolNotFound {
                tool: "whisper".to_string(),
            });
        }
        info!("Whisper transcription ready (model '{}')", self.model);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn transcribe(&self, audio: &Path) -> TranscriptionResult {
        if !audio.exists() {
            return TranscriptionResult::failed(
                ProcessError::FileNotFound(audio.to_path_buf()).to_string(),
            );
        }
        if !self.is_initialized() {
            return TranscriptionResult::failed("Whisper is not initialized");
        }

        info!("Transcribing {:?} with model '{}'", audio, self.model);
        match self.run_whisper(audio).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Transcription of {:?} failed: {}", audio, e);
                TranscriptionResult::failed(e.to_string())
            }
        }
    }
}
