//! Scribe Core - Core types and domain models for the scribe ingestion pipeline.
//!
//! This crate provides:
//! - The content model shared by extractors, normalizer and chunker
//! - Layout vocabulary produced by layout-aware OCR
//! - Batch reporting types
//! - Collaborator traits for the vector index and embedding backends

mod error;
mod index;
mod layout;
mod types;

pub use error::{Error, Result};
pub use index::{Embedder, IndexStats, VectorIndex};
pub use layout::{LayoutCategory, LayoutDocument, LayoutElement};
pub use types::*;
