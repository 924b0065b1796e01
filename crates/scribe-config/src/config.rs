//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.processing;
        if p.chunk_size == 0 {
            return Err(ConfigError::Invalid("processing.chunk_size must be > 0".into()));
        }
        if p.chunk_overlap >= p.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "processing.chunk_overlap ({}) must be smaller than chunk_size ({})",
                p.chunk_overlap, p.chunk_size
            )));
        }
        if p.batch_size == 0 {
            return Err(ConfigError::Invalid("processing.batch_size must be > 0".into()));
        }
        if p.script_range_start > p.script_range_end {
            return Err(ConfigError::Invalid(
                "processing.script_range_start must not exceed script_range_end".into(),
            ));
        }
        if self.ocr.dpi == 0 {
            return Err(ConfigError::Invalid("ocr.dpi must be > 0".into()));
        }
        if self.watch.scan_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "watch.scan_interval_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default_config_string())?;
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Scribe Configuration
# Document ingestion pipeline

[general]
# Data directory for the index database and fingerprint store
# data_dir = "~/.local/share/scribe"

[watch]
# Directory polled for new documents
directory = "./storage/watch"

# Seconds between scans
scan_interval_seconds = 3600

# Set to false to disable the periodic watcher
enabled = true

# Only files with these extensions are picked up
supported_extensions = [
    ".pdf", ".docx", ".doc", ".txt",
    ".png", ".jpg", ".jpeg", ".tiff", ".bmp",
    ".mp3", ".wav", ".m4a", ".flac",
]

# File patterns to ignore
ignore_patterns = ["*.tmp", "*.temp", "*.part", "~$*"]

# Remove source files once they are indexed
delete_processed = true

# Override the fingerprint store location
# processed_files_db = "./storage/processed_files.json"

[processing]
max_file_size_mb = 100
chunk_size = 1000
chunk_overlap = 200

# Files extracted concurrently per wave
batch_size = 5

# Measure chunk length in words for text in the script range below
script_aware_length = true
script_range_start = 0x0590     # Hebrew block
script_range_end = 0x05FF

[ocr]
# Layout-aware OCR through an Ollama vision model
primary_enabled = true
layout_model = "qwen2.5vl:7b"

# Rasterization resolution for scanned PDFs
dpi = 200

# Languages for the Tesseract fallback
tesseract_lang = "heb+eng"

# Per-attempt timeout
timeout_seconds = 600

# PDFs averaging fewer characters per page are treated as scanned
scanned_pdf_min_chars = 50

[transcription]
enabled = true
# Whisper model size: tiny, base, small, medium, large
whisper_model = "base"
language = "he"
timeout_seconds = 1800

[ollama]
host = "http://localhost:11434"
embedding_model = "nomic-embed-text"
timeout_seconds = 120

[index]
# Compute embeddings when chunks are stored
embed = true
"#
        .to_string()
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// Directory watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub directory: String,
    pub scan_interval_seconds: u64,
    pub enabled: bool,
    pub supported_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub delete_processed: bool,
    pub processed_files_db: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: "./storage/watch".to_string(),
            scan_interval_seconds: 3600,
            enabled: true,
            supported_extensions: [
                ".pdf", ".docx", ".doc", ".txt", ".png", ".jpg", ".jpeg", ".tiff", ".bmp",
                ".mp3", ".wav", ".m4a", ".flac",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.temp".to_string(),
                "*.part".to_string(),
                "~$*".to_string(),
            ],
            delete_processed: true,
            processed_files_db: None,
        }
    }
}

/// Extraction and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_file_size_mb: f64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub script_aware_length: bool,
    pub script_range_start: u32,
    pub script_range_end: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100.0,
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 5,
            script_aware_length: true,
            script_range_start: 0x0590,
            script_range_end: 0x05FF,
        }
    }
}

/// OCR settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub primary_enabled: bool,
    pub layout_model: String,
    pub dpi: u32,
    pub tesseract_lang: String,
    pub timeout_seconds: u64,
    pub scanned_pdf_min_chars: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            primary_enabled: true,
            layout_model: "qwen2.5vl:7b".to_string(),
            dpi: 200,
            tesseract_lang: "heb+eng".to_string(),
            timeout_seconds: 600,
            scanned_pdf_min_chars: 50,
        }
    }
}

/// Audio transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub enabled: bool,
    pub whisper_model: String,
    pub language: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            whisper_model: "base".to_string(),
            language: Some("he".to_string()),
            timeout_seconds: 1800,
        }
    }
}

/// Ollama server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub embedding_model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub embed: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { embed: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.processing.chunk_size, 1000);
        assert_eq!(config.processing.chunk_overlap, 200);
        assert_eq!(config.processing.batch_size, 5);
        assert_eq!(config.ocr.dpi, 200);
        assert_eq!(config.watch.scan_interval_seconds, 3600);
        assert!(config.watch.supported_extensions.contains(&".pdf".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_string_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_config_string()).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.watch.supported_extensions, defaults.watch.supported_extensions);
        assert_eq!(parsed.processing.script_range_start, 0x0590);
        assert_eq!(parsed.ocr.tesseract_lang, defaults.ocr.tesseract_lang);
        assert_eq!(parsed.transcription.language, defaults.transcription.language);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [processing]
            chunk_size = 500
            chunk_overlap = 50
            "#
        )
        .unwrap();

        let config = Config::load_from(temp_file.path()).unwrap();

        assert_eq!(config.processing.chunk_size, 500);
        // Defaults should still work
        assert_eq!(config.processing.max_file_size_mb, 100.0);
        assert_eq!(config.watch.directory, "./storage/watch");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.processing.chunk_size, 1000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.processing.chunk_overlap = config.processing.chunk_size;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.watch.directory = "/tmp/inbox".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.watch.directory, "/tmp/inbox");
    }
}
