//! Scribe Ingest - Document ingestion pipeline for scribe.
//!
//! This crate provides:
//! - Per-format extractors for PDF, Word, text, image and audio files
//! - Normalization into marker-delimited text with aggregate metadata
//! - Recursive, overlap-aware chunking with a script-aware length measure
//! - Batched processing with per-file failure isolation
//! - A polling directory watcher with persistent fingerprint dedup

mod chunker;
mod error;
pub mod extractors;
mod fingerprint;
mod normalizer;
mod orchestrator;
mod pipeline;
mod processor;
mod watcher;

pub use chunker::{CharLength, ChunkConfig, Chunker, LengthMeasure, ScriptAwareLength};
pub use error::{IngestError, IngestResult};
pub use extractors::{Extractor, Extractors};
pub use fingerprint::{compute_fingerprint, FingerprintStore};
pub use normalizer::{normalize, FORMULA_CLOSE, FORMULA_OPEN, TABLE_CLOSE, TABLE_OPEN};
pub use orchestrator::BatchOrchestrator;
pub use pipeline::{IngestReport, Ingestor};
pub use processor::DocumentProcessor;
pub use watcher::{
    fingerprint_store_path, DirectoryWatcher, ScanSummary, WatchSettings, WatcherStatus,
};
