//! Application paths management.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths following platform conventions.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub fingerprint_file: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Create paths using platform-specific directories.
    pub fn new() -> Option<Self> {
        let proj_dirs = ProjectDirs::from("com", "scribe", "scribe")?;
        Some(Self::with_dirs(
            proj_dirs.config_dir().to_path_buf(),
            proj_dirs.data_dir().to_path_buf(),
        ))
    }

    /// Create paths rooted at explicit config and data directories.
    pub fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            log_dir: data_dir.join("logs"),
            database_file: data_dir.join("scribe.db"),
            fingerprint_file: data_dir.join("processed_files.json"),
            config_dir,
            data_dir,
        }
    }

    /// Re-root the data directory, e.g. from `general.data_dir`.
    pub fn with_data_dir(self, data_dir: Option<&str>) -> Self {
        match data_dir {
            Some(dir) => Self::with_dirs(self.config_dir, expand_path(dir)),
            None => self,
        }
    }

    /// Create all necessary directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Check if scribe has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => Path::new(shellexpand::tilde(path).as_ref()).to_path_buf(),
    }
}
