//! Persisted set of processed-file fingerprints.

use crate::error::{IngestError, IngestResult};
use chrono::{DateTime, Utc};
use scribe_core::FileFingerprint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Fingerprint of one version of a file: SHA-256 over `name_mtime_size`.
///
/// Falls back to hashing the file name alone when the file cannot be
/// stat'ed, so the result is always usable as a key.
pub fn compute_fingerprint(path: &Path) -> FileFingerprint {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let input = match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            format!("{}_{}_{}", name, mtime, meta.len())
        }
        Err(e) => {
            warn!("Could not stat {:?} for fingerprinting: {}", path, e);
            name
        }
    };

    FileFingerprint::new(format!("{:x}", Sha256::digest(input.as_bytes())))
}

/// On-disk layout of the store.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    processed_files: Vec<FileFingerprint>,
    last_updated: DateTime<Utc>,
    total_processed: usize,
}

/// Set of fingerprints that have been fully ingested.
#[derive(Debug)]
pub struct FingerprintStore {
    path: PathBuf,
    processed: BTreeSet<FileFingerprint>,
}

impl FingerprintStore {
    /// Load the store. A missing or unreadable file yields an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let processed = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StoreFile>(&raw) {
                Ok(file) => {
                    info!(
                        "Loaded {} processed file fingerprints from {:?}",
                        file.processed_files.len(),
                        path
                    );
                    file.processed_files.into_iter().collect()
                }
                Err(e) => {
                    warn!("Fingerprint store {:?} is corrupt, starting empty: {}", path, e);
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No fingerprint store at {:?}, starting fresh", path);
                BTreeSet::new()
            }
            Err(e) => {
                warn!("Could not read fingerprint store {:?}, starting empty: {}", path, e);
                BTreeSet::new()
            }
        };

        Self { path, processed }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, fingerprint: &FileFingerprint) -> bool {
        self.processed.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Add fingerprints and persist the union.
    ///
    /// The new snapshot is written to a temporary file in the same directory
    /// and renamed over the old one. The in-memory set only changes once the
    /// rename succeeded.
    pub fn commit<I>(&mut self, fingerprints: I) -> IngestResult<()>
    where
        I: IntoIterator<Item = FileFingerprint>,
    {
        self.commit_with(fingerprints, |tmp, json| tmp.write_all(json))
    }

    fn commit_with<I, W>(&mut self, fingerprints: I, write: W) -> IngestResult<()>
    where
        I: IntoIterator<Item = FileFingerprint>,
        W: FnOnce(&mut NamedTempFile, &[u8]) -> std::io::Result<()>,
    {
        let mut next = self.processed.clone();
        next.extend(fingerprints);

        let file = StoreFile {
            processed_files: next.iter().cloned().collect(),
            last_updated: Utc::now(),
            total_processed: next.len(),
        };
        self.write_atomically(&file, write)?;

        debug!("Saved {} fingerprints to {:?}", next.len(), self.path);
        self.processed = next;
        Ok(())
    }

    fn write_atomically<W>(&self, file: &StoreFile, write: W) -> IngestResult<()>
    where
        W: FnOnce(&mut NamedTempFile, &[u8]) -> std::io::Result<()>,
    {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| IngestError::Fingerprint(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        write(&mut tmp, &json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| IngestError::Fingerprint(e.to_string()))?;
        Ok(())
    }
}
