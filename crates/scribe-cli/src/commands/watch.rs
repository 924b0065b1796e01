//! Watch command - run the directory watcher in the foreground.

use super::{build_pipeline, load, print_report};
use anyhow::{Context, Result};
use colored::Colorize;
use scribe_ingest::{DirectoryWatcher, ScanSummary};
use tokio::runtime::Runtime;
use tracing::error;

pub fn run() -> Result<()> {
    let (config, paths) = load()?;

    if !config.watch.enabled {
        println!("{}", "The directory watcher is disabled.".yellow());
        println!("Enable it with: {}", "scribe config set watch.enabled true".cyan());
        return Ok(());
    }

    let rt = Runtime::new().context("Failed to create async runtime")?;

    let missing: Vec<_> = scribe_process::check_dependencies()
        .into_iter()
        .filter(|(_, available)| !available)
        .collect();
    if !missing.is_empty() {
        println!("{}", "Warning: Some processing tools are not available:".yellow());
        for (tool, _) in &missing {
            println!("  - {}", tool);
        }
        println!();
    }

    let ingestor = build_pipeline(&config, &paths, &rt)?;
    let watcher = DirectoryWatcher::from_config(&config, &paths, ingestor);

    println!(
        "{} {} (every {}s)",
        "Watching".cyan().bold(),
        watcher.settings().directory.display(),
        config.watch.scan_interval_seconds
    );
    println!("Press Ctrl+C to stop.\n");

    rt.block_on(async {
        watcher.start().await?;

        match watcher.force_scan().await {
            Ok(Some(summary)) => print_summary(&summary),
            Ok(None) => {}
            Err(e) => error!("Initial scan failed: {}", e),
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;

        println!("\n{}", "Stopping watcher...".cyan());
        watcher.stop().await;
        anyhow::Ok(())
    })?;

    println!("{}", "Stopped.".green());
    Ok(())
}

/// Print what one scan did.
pub fn print_summary(summary: &ScanSummary) {
    if summary.new_files == 0 {
        println!(
            "{} ({} files already processed)",
            "Nothing new.".dimmed(),
            summary.candidates
        );
        return;
    }

    println!(
        "{} {} new of {} files",
        "Scan:".cyan().bold(),
        summary.new_files,
        summary.candidates
    );
    if let Some(ingest) = &summary.ingest {
        print_report(ingest);
    }
    println!(
        "  Recorded {} fingerprints, removed {} processed files",
        summary.committed, summary.deleted
    );
}
