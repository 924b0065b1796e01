//! Scan command - one forced scan of the watch directory.

use super::watch::print_summary;
use super::{build_pipeline, load};
use anyhow::{Context, Result};
use colored::Colorize;
use scribe_ingest::DirectoryWatcher;
use tokio::runtime::Runtime;

pub fn run() -> Result<()> {
    let (config, paths) = load()?;
    let rt = Runtime::new().context("Failed to create async runtime")?;

    let ingestor = build_pipeline(&config, &paths, &rt)?;
    let watcher = DirectoryWatcher::from_config(&config, &paths, ingestor);

    println!(
        "{} {}",
        "Scanning".cyan().bold(),
        watcher.settings().directory.display()
    );

    match rt.block_on(watcher.force_scan())? {
        Some(summary) => print_summary(&summary),
        None => println!(
            "{} Enable it with: {}",
            "The directory watcher is disabled.".yellow(),
            "scribe config set watch.enabled true".cyan()
        ),
    }

    Ok(())
}
