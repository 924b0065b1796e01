//! Polling directory watcher with fingerprint dedup.

use crate::error::{IngestError, IngestResult};
use crate::fingerprint::{compute_fingerprint, FingerprintStore};
use crate::pipeline::{IngestReport, Ingestor};
use chrono::{DateTime, Utc};
use glob::Pattern;
use scribe_config::{expand_path, AppPaths, Config, WatchConfig};
use scribe_core::FileFingerprint;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Watcher settings resolved from [`WatchConfig`].
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub directory: PathBuf,
    pub scan_interval: Duration,
    pub enabled: bool,
    /// Lowercase, with the leading dot.
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<Pattern>,
    pub delete_processed: bool,
}

impl WatchSettings {
    pub fn from_config(config: &WatchConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid ignore pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            directory: expand_path(&config.directory),
            scan_interval: Duration::from_secs(config.scan_interval_seconds.max(1)),
            enabled: config.enabled,
            extensions: config
                .supported_extensions
                .iter()
                .map(|e| format!(".{}", e.trim_start_matches('.').to_lowercase()))
                .collect(),
            ignore_patterns,
            delete_processed: config.delete_processed,
        }
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if name.starts_with('.') {
            return true;
        }
        self.ignore_patterns.iter().any(|p| p.matches(name))
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Supported, non-ignored files under the watch directory, sorted by path.
    fn list_candidates(&self) -> IngestResult<Vec<PathBuf>> {
        if !self.directory.is_dir() {
            return Err(IngestError::Watch(format!(
                "watch directory {:?} does not exist",
                self.directory
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.directory)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", self.directory, e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || self.should_ignore(path) {
                continue;
            }
            if self.is_supported(path) {
                files.push(path.to_path_buf());
            } else {
                debug!("Ignoring unsupported file: {:?}", path);
            }
        }

        Ok(files)
    }
}

/// `watch.processed_files_db` if set, else the fingerprint file in the data dir.
pub fn fingerprint_store_path(config: &Config, paths: &AppPaths) -> PathBuf {
    config
        .watch
        .processed_files_db
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(|| paths.fingerprint_file.clone())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Snapshot reported by [`DirectoryWatcher::status`].
#[derive(Debug, Clone, Serialize)]
pub struct WatcherStatus {
    pub enabled: bool,
    pub running: bool,
    pub watch_directory: PathBuf,
    pub scan_interval_seconds: u64,
    pub processed_files_count: usize,
    pub last_scan: Option<DateTime<Utc>>,
}

/// What one scan did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Supported files found in the directory.
    pub candidates: usize,
    /// Candidates whose fingerprint was not yet in the store.
    pub new_files: usize,
    /// Fingerprints committed to the store.
    pub committed: usize,
    /// Source files removed after commit.
    pub deleted: usize,
    /// Present when new files were handed to the ingestor.
    pub ingest: Option<IngestReport>,
}

type Candidates = Vec<(PathBuf, FileFingerprint)>;

struct ScanState {
    store: FingerprintStore,
    last_scan: Option<DateTime<Utc>>,
}

struct Shared {
    settings: WatchSettings,
    ingestor: Arc<Ingestor>,
    /// Held for a whole scan.
    scanning: Mutex<()>,
    /// Held only to read or update the store, never across a batch.
    state: Mutex<ScanState>,
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Scans a directory on an interval and ingests files it has not seen.
///
/// Scans are serialized: a forced scan issued while the loop is scanning
/// waits for it to finish.
pub struct DirectoryWatcher {
    shared: Arc<Shared>,
    task: Mutex<Option<RunningLoop>>,
}

impl DirectoryWatcher {
    pub fn new(settings: WatchSettings, ingestor: Arc<Ingestor>, store: FingerprintStore) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                ingestor,
                scanning: Mutex::new(()),
                state: Mutex::new(ScanState {
                    store,
                    last_scan: None,
                }),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config, paths: &AppPaths, ingestor: Arc<Ingestor>) -> Self {
        Self::new(
            WatchSettings::from_config(&config.watch),
            ingestor,
            FingerprintStore::load(fingerprint_store_path(config, paths)),
        )
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.shared.settings
    }

    /// Start the scan loop. Creates the watch directory if needed.
    ///
    /// Does nothing when the watcher is disabled or already running.
    pub async fn start(&self) -> IngestResult<()> {
        let settings = &self.shared.settings;
        if !settings.enabled {
            warn!("Directory watcher is disabled");
            return Ok(());
        }

        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            warn!("Directory watcher is already running");
            return Ok(());
        }

        tokio::fs::create_dir_all(&settings.directory).await?;

        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(run_loop(Arc::clone(&self.shared), receiver));
        *task = Some(RunningLoop { shutdown, handle });

        info!(
            "Watching {:?} every {}s",
            settings.directory,
            settings.scan_interval.as_secs()
        );
        Ok(())
    }

    /// Stop the loop and wait for it to exit. An in-flight scan finishes first.
    pub async fn stop(&self) {
        let Some(running) = self.task.lock().await.take() else {
            debug!("Directory watcher is not running");
            return;
        };

        // The receiver may already be gone if the loop exited on its own.
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            warn!("Watcher loop ended abnormally: {}", e);
        }
        info!("Directory watcher stopped");
    }

    /// Scan now, whether or not the loop is running.
    ///
    /// Returns `None` when the watcher is disabled.
    pub async fn force_scan(&self) -> IngestResult<Option<ScanSummary>> {
        if !self.shared.settings.enabled {
            warn!("Directory watcher is disabled, not scanning");
            return Ok(None);
        }
        info!("Forced scan of {:?}", self.shared.settings.directory);
        self.shared.scan().await.map(Some)
    }

    pub async fn status(&self) -> WatcherStatus {
        let running = self
            .task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished());
        let state = self.shared.state.lock().await;
        let settings = &self.shared.settings;

        WatcherStatus {
            enabled: settings.enabled,
            running,
            watch_directory: settings.directory.clone(),
            scan_interval_seconds: settings.scan_interval.as_secs(),
            processed_files_count: state.store.len(),
            last_scan: state.last_scan,
        }
    }
}

async fn run_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(shared.settings.scan_interval) => {}
            _ = shutdown.changed() => break,
        }

        match shared.scan().await {
            Ok(summary) if summary.new_files > 0 => info!(
                "Scan done: {} new, {} committed, {} deleted",
                summary.new_files, summary.committed, summary.deleted
            ),
            Ok(_) => debug!("Scan found nothing new"),
            Err(e) => error!("Scan of {:?} failed: {}", shared.settings.directory, e),
        }
    }
    debug!("Watcher loop exited");
}

impl Shared {
    /// Candidate files with their fingerprints, walked off the async workers.
    async fn fingerprint_candidates(&self) -> IngestResult<Candidates> {
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || -> IngestResult<Candidates> {
            let files = settings.list_candidates()?;
            Ok(files
                .into_iter()
                .map(|path| {
                    let fingerprint = compute_fingerprint(&path);
                    (path, fingerprint)
                })
                .collect())
        })
        .await
        .map_err(|e| IngestError::Watch(format!("directory listing aborted: {}", e)))?
    }

    async fn scan(&self) -> IngestResult<ScanSummary> {
        let _scanning = self.scanning.lock().await;
        let candidates = self.fingerprint_candidates().await?;

        let fresh: Candidates = {
            let mut state = self.state.lock().await;
            state.last_scan = Some(Utc::now());
            candidates
                .iter()
                .filter(|(_, fingerprint)| !state.store.contains(fingerprint))
                .cloned()
                .collect()
        };

        let mut summary = ScanSummary {
            candidates: candidates.len(),
            new_files: fresh.len(),
            ..ScanSummary::default()
        };
        if fresh.is_empty() {
            return Ok(summary);
        }

        info!("Found {} new files in {:?}", fresh.len(), self.settings.directory);
        let paths: Vec<PathBuf> = fresh.iter().map(|(path, _)| path.clone()).collect();
        let ingest = self.ingestor.process_and_add_files(&paths).await;

        if ingest.success {
            let succeeded: HashSet<&Path> = ingest
                .report
                .successful
                .iter()
                .map(|f| f.file.as_path())
                .collect();
            let done: Vec<&(PathBuf, FileFingerprint)> = fresh
                .iter()
                .filter(|(path, _)| succeeded.contains(path.as_path()))
                .collect();

            let committed = self
                .state
                .lock()
                .await
                .store
                .commit(done.iter().map(|(_, fp)| fp.clone()));
            match committed {
                Ok(()) => {
                    summary.committed = done.len();
                    if self.settings.delete_processed {
                        summary.deleted = delete_files(done.iter().map(|(path, _)| path)).await;
                    }
                }
                Err(e) => error!(
                    "Could not save fingerprints, these files will be processed again: {}",
                    e
                ),
            }
        } else {
            warn!(
                "Batch was not indexed: {}",
                ingest.error.as_deref().unwrap_or("unknown error")
            );
        }

        summary.ingest = Some(ingest);
        Ok(summary)
    }
}

async fn delete_files<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> usize {
    let mut deleted = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted processed file {:?}", path);
                deleted += 1;
            }
            Err(e) => warn!("Could not delete processed file {:?}: {}", path, e),
        }
    }
    deleted
}
