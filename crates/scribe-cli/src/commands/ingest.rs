//! Ingest command - process explicit files and directories.

use super::{build_pipeline, load, print_report};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use scribe_core::FileKind;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

fn kind_of(path: &Path) -> Option<FileKind> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FileKind::from_extension)
}

/// Expand directories into their supported, non-hidden files.
fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Path does not exist: {}", input.display());
        }
        if input.is_file() {
            files.push(input.clone());
            continue;
        }

        files.extend(
            walkdir::WalkDir::new(input)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    !e.file_name()
                        .to_str()
                        .map(|n| n.starts_with('.'))
                        .unwrap_or(false)
                })
                .filter(|e| kind_of(e.path()).is_some())
                .map(|e| e.into_path()),
        );
    }

    Ok(files)
}

pub fn run(inputs: &[PathBuf], dry_run: bool) -> Result<()> {
    let files = collect_files(inputs)?;
    if files.is_empty() {
        println!("{}", "No supported files found.".yellow());
        return Ok(());
    }

    println!("Found {} files", files.len());

    if dry_run {
        for file in &files {
            let kind = kind_of(file)
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unsupported".to_string());
            println!("  {} [{}]", file.display(), kind);
        }
        println!("\n{}", "Dry run - no files were ingested.".cyan());
        return Ok(());
    }

    let (config, paths) = load()?;
    let rt = Runtime::new().context("Failed to create async runtime")?;
    let ingestor = build_pipeline(&config, &paths, &rt)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!(
        "Processing {} files in waves of {}",
        files.len(),
        ingestor.orchestrator().batch_size()
    ));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let outcome = rt.block_on(ingestor.process_and_add_files(&files));
    pb.finish_and_clear();

    print_report(&outcome);
    Ok(())
}
