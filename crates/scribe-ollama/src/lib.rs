//! Scribe Ollama - Ollama integration for embeddings and vision models.
//!
//! This crate provides an async client for Ollama's API: embedding
//! generation for the index, image-conditioned generation for layout-aware
//! OCR, and model residency control so batch processing can release memory.

mod client;
mod embedder;
mod error;
mod types;

pub use client::OllamaClient;
pub use embedder::OllamaEmbedder;
pub use error::{OllamaError, OllamaResult};
pub use types::*;
