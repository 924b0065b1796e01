//! Configuration commands.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use scribe_config::Config;
use std::str::FromStr;

pub fn show() -> Result<()> {
    let paths = get_paths()?;

    if !paths.config_file.exists() {
        anyhow::bail!("Config file not found. Run 'scribe init' first.");
    }

    let contents =
        std::fs::read_to_string(&paths.config_file).context("Failed to read config file")?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", get_paths()?.config_file.display());
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, value))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn optional(value: &str) -> Option<String> {
    match value {
        "" | "none" => None,
        v => Some(v.to_string()),
    }
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let paths = get_paths()?;

    let mut config = Config::load_from(&paths.config_file).context("Failed to load config")?;

    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "data_dir"] => config.general.data_dir = optional(value),
        ["watch", "directory"] => config.watch.directory = value.to_string(),
        ["watch", "scan_interval_seconds"] => {
            config.watch.scan_interval_seconds = parse(key, value)?
        }
        ["watch", "enabled"] => config.watch.enabled = parse(key, value)?,
        ["watch", "supported_extensions"] => {
            config.watch.supported_extensions = parse_list(value)
        }
        ["watch", "ignore_patterns"] => config.watch.ignore_patterns = parse_list(value),
        ["watch", "delete_processed"] => config.watch.delete_processed = parse(key, value)?,
        ["watch", "processed_files_db"] => config.watch.processed_files_db = optional(value),
        ["processing", "max_file_size_mb"] => {
            config.processing.max_file_size_mb = parse(key, value)?
        }
        ["processing", "chunk_size"] => config.processing.chunk_size = parse(key, value)?,
        ["processing", "chunk_overlap"] => config.processing.chunk_overlap = parse(key, value)?,
        ["processing", "batch_size"] => config.processing.batch_size = parse(key, value)?,
        ["processing", "script_aware_length"] => {
            config.processing.script_aware_length = parse(key, value)?
        }
        ["ocr", "primary_enabled"] => config.ocr.primary_enabled = parse(key, value)?,
        ["ocr", "layout_model"] => config.ocr.layout_model = value.to_string(),
        ["ocr", "dpi"] => config.ocr.dpi = parse(key, value)?,
        ["ocr", "tesseract_lang"] => config.ocr.tesseract_lang = value.to_string(),
        ["ocr", "timeout_seconds"] => config.ocr.timeout_seconds = parse(key, value)?,
        ["ocr", "scanned_pdf_min_chars"] => {
            config.ocr.scanned_pdf_min_chars = parse(key, value)?
        }
        ["transcription", "enabled"] => config.transcription.enabled = parse(key, value)?,
        ["transcription", "whisper_model"] => {
            config.transcription.whisper_model = value.to_string()
        }
        ["transcription", "language"] => config.transcription.language = optional(value),
        ["transcription", "timeout_seconds"] => {
            config.transcription.timeout_seconds = parse(key, value)?
        }
        ["ollama", "host"] => config.ollama.host = value.to_string(),
        ["ollama", "embedding_model"] => config.ollama.embedding_model = value.to_string(),
        ["ollama", "timeout_seconds"] => config.ollama.timeout_seconds = parse(key, value)?,
        ["index", "embed"] => config.index.embed = parse(key, value)?,
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    }

    config
        .save_to(&paths.config_file)
        .context("Failed to save config")?;

    println!("{} Set {} = {}", "✓".green(), key.cyan(), value);

    Ok(())
}
