//! Initialize scribe.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use scribe_config::{expand_path, Config};
use scribe_store::Database;

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Scribe is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing scribe...".cyan().bold());

    Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    println!(
        "  {} Created config: {}",
        "✓".green(),
        paths.config_file.display()
    );

    let config = Config::load_from(&paths.config_file).context("Failed to load configuration")?;
    let paths = paths.with_data_dir(config.general.data_dir.as_deref());
    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!(
        "  {} Created database: {}",
        "✓".green(),
        paths.database_file.display()
    );

    let watch_dir = expand_path(&config.watch.directory);
    std::fs::create_dir_all(&watch_dir).context("Failed to create watch directory")?;
    println!(
        "  {} Watch directory: {}",
        "✓".green(),
        watch_dir.display()
    );

    println!();
    println!("{}", "Scribe initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Set the watch directory: {}",
        "scribe config set watch.directory ~/Documents/inbox".cyan()
    );
    println!("  2. Drop files into it and run: {}", "scribe watch".cyan());
    println!("  3. Check status: {}", "scribe status".cyan());

    Ok(())
}
