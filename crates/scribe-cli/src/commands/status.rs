//! Status command - watcher, index and tool status.

use super::load;
use anyhow::{Context, Result};
use colored::Colorize;
use scribe_config::expand_path;
use scribe_ingest::{fingerprint_store_path, FingerprintStore};
use scribe_ollama::OllamaClient;
use scribe_store::Database;
use tokio::runtime::Runtime;

pub fn run() -> Result<()> {
    let (config, paths) = load()?;

    println!("{}", "Scribe Status".cyan().bold());
    println!("{}", "─".repeat(50));

    println!();
    println!("{}", "Watcher".white().bold());
    let watch_dir = expand_path(&config.watch.directory);
    let enabled = if config.watch.enabled {
        "yes".green()
    } else {
        "no".yellow()
    };
    println!("  Enabled: {}", enabled);
    if watch_dir.is_dir() {
        println!("  Directory: {} (exists)", watch_dir.display());
    } else {
        println!("  Directory: {} {}", watch_dir.display(), "(not found)".red());
    }
    println!("  Scan interval: {}s", config.watch.scan_interval_seconds);
    let store = FingerprintStore::load(fingerprint_store_path(&config, &paths));
    println!("  Processed files: {}", store.len());

    println!();
    println!("{}", "Index".white().bold());
    if paths.database_file.exists() {
        let db = Database::open(&paths.database_file).context("Failed to open index database")?;
        if !db.integrity_check()? {
            println!("  {} integrity check failed", "!".red());
        }
        println!("  Chunks: {}", db.chunk_count()?);
        println!("  Documents: {}", db.document_count()?);
        match db.embedding_dimensions()? {
            Some(dim) => println!("  Embedding dimensions: {}", dim),
            None => println!("  Embedding dimensions: {}", "none stored".dimmed()),
        }
    } else {
        println!("  {} Run 'scribe init' first.", "No database.".yellow());
    }

    println!();
    println!("{}", "Models".white().bold());
    let rt = Runtime::new().context("Failed to create async runtime")?;
    let client = OllamaClient::from_config(&config.ollama).context("Failed to create Ollama client")?;
    if rt.block_on(client.is_available()) {
        println!("  {} Ollama at {}", "+".green(), config.ollama.host);
        for model in [&config.ocr.layout_model, &config.ollama.embedding_model] {
            match rt.block_on(client.has_model(model)) {
                Ok(true) => println!("  {} {} (pulled)", "+".green(), model),
                _ => println!("  {} {} (not pulled)", "-".red(), model),
            }
        }
    } else {
        println!("  {} Ollama at {} (not running)", "-".red(), config.ollama.host);
    }

    println!();
    println!("Processing tools:");
    for (tool, available) in scribe_process::check_dependencies() {
        if available {
            println!("  {} {} (installed)", "+".green(), tool);
        } else {
            println!("  {} {} (not found)", "-".red(), tool);
        }
    }

    Ok(())
}
