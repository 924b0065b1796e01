//! CLI command implementations.

pub mod config;
pub mod ingest;
pub mod init;
pub mod scan;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use colored::Colorize;
use scribe_config::{AppPaths, Config};
use scribe_ingest::{IngestReport, Ingestor};
use scribe_ollama::{OllamaClient, OllamaEmbedder};
use scribe_process::{OcrChain, Transcriber, WhisperTranscriber};
use scribe_store::{Database, SqliteIndex};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Load the config and the paths it points at.
pub fn load() -> Result<(Config, AppPaths)> {
    let paths = get_paths()?;
    let config = Config::load_from(&paths.config_file).context("Failed to load configuration")?;
    let paths = paths.with_data_dir(config.general.data_dir.as_deref());
    Ok((config, paths))
}

/// Open the index and build the ingestion pipeline from config.
///
/// OCR engines that cannot start are reported here; images and scanned
/// PDFs then fail per file instead of aborting the command.
pub fn build_pipeline(config: &Config, paths: &AppPaths, rt: &Runtime) -> Result<Arc<Ingestor>> {
    paths.ensure_dirs().context("Failed to create directories")?;

    let db = Database::open(&paths.database_file).context("Failed to open index database")?;
    let mut index = SqliteIndex::new(db);

    if config.index.embed {
        let client = OllamaClient::from_config(&config.ollama)
            .context("Failed to create Ollama client")?;
        if !rt.block_on(client.is_available()) {
            anyhow::bail!(
                "Ollama is not running at {}. Start it with 'ollama serve', or set index.embed = false.",
                config.ollama.host
            );
        }
        let embedder = OllamaEmbedder::from_config(&config.ollama)
            .context("Failed to create embedder")?;
        index = index.with_embedder(Arc::new(embedder));
    }
    let index = Arc::new(index);

    let ocr = Arc::new(OcrChain::from_config(config).context("Failed to set up OCR")?);
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(WhisperTranscriber::from_config(&config.transcription));

    let ingestor = Ingestor::from_config(config, Some(ocr), Some(transcriber), index);

    if let Err(e) = rt.block_on(ingestor.orchestrator().processor().initialize()) {
        println!("{} {}", "Warning:".yellow().bold(), e);
        println!("Images and scanned PDFs will fail until an OCR engine is available.\n");
    }

    Ok(Arc::new(ingestor))
}

/// Print the per-file outcome of an ingestion run.
pub fn print_report(outcome: &IngestReport) {
    for file in &outcome.report.successful {
        println!(
            "  {} {} ({} chunks)",
            "✓".green(),
            file.file.display(),
            file.chunks.len()
        );
    }
    for file in &outcome.report.failed {
        let marker = if file.kind.is_feature_absent() {
            "-".yellow()
        } else {
            "✗".red()
        };
        println!("  {} {}: {}", marker, file.file.display(), file.error);
    }

    println!();
    if outcome.success {
        println!(
            "{} {} files, {} chunks added",
            "Ingested:".green().bold(),
            outcome.files_processed,
            outcome.documents_added
        );
        if let Some(total) = outcome.total_documents {
            println!("  Index now holds {} chunks", total);
        }
    } else if let Some(error) = &outcome.error {
        println!("{} {}", "Not indexed:".red().bold(), error);
    }
    if outcome.files_failed > 0 {
        println!("{} {} files", "Failed:".red().bold(), outcome.files_failed);
    }
}
