//! Recursive separator-based chunking.
//!
//! Text is split on the first separator of the hierarchy that occurs in it.
//! Pieces that are still too long are split again with the remaining
//! separators; short pieces are merged back into windows of at most
//! `chunk_size` units, carrying up to `chunk_overlap` units from the end of
//! one window into the next. Separators stay attached to the start of the
//! piece that follows them, so no text is lost.

use scribe_config::ProcessingConfig;
use scribe_core::{Chunk, ChunkMetadata, NormalizedDocument};
use std::collections::VecDeque;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Paragraphs, lines, sentence punctuation, clauses, words, characters.
pub const DEFAULT_SEPARATORS: [&str; 9] = ["\n\n", "\n", ".", "!", "?", ";", ",", " ", ""];

/// How chunk length is measured.
pub trait LengthMeasure: Send + Sync {
    fn measure(&self, text: &str) -> usize;
}

/// Length in Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharLength;

impl LengthMeasure for CharLength {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Token count for text containing the target script, characters otherwise.
///
/// Tokens are the non-whitespace word-boundary segments of the text, so
/// words and punctuation marks count one each.
#[derive(Debug, Clone, Copy)]
pub struct ScriptAwareLength {
    start: char,
    end: char,
}

impl ScriptAwareLength {
    pub fn new(start: char, end: char) -> Self {
        Self { start, end }
    }

    /// Hebrew block, U+0590..=U+05FF.
    pub fn hebrew() -> Self {
        Self::new('\u{0590}', '\u{05FF}')
    }

    fn has_script(&self, text: &str) -> bool {
        text.chars().any(|c| (self.start..=self.end).contains(&c))
    }
}

impl LengthMeasure for ScriptAwareLength {
    fn measure(&self, text: &str) -> usize {
        if self.has_script(text) {
            text.split_word_bounds()
                .filter(|s| !s.trim().is_empty())
                .count()
        } else {
            text.chars().count()
        }
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length, in the units of the length measure.
    pub chunk_size: usize,
    /// Units carried over between consecutive chunks.
    pub chunk_overlap: usize,
    /// Separator hierarchy, coarsest first. An empty string splits characters.
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        }
    }
}

/// Splits normalized documents into overlapping chunks.
pub struct Chunker {
    config: ChunkConfig,
    length: Box<dyn LengthMeasure>,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            length: Box::new(CharLength),
        }
    }

    pub fn with_length(mut self, length: Box<dyn LengthMeasure>) -> Self {
        self.length = length;
        self
    }

    /// Size, overlap and length measure from the processing settings.
    pub fn from_config(config: &ProcessingConfig) -> Self {
        let chunker = Self::new(ChunkConfig::new(config.chunk_size, config.chunk_overlap));
        if !config.script_aware_length {
            return chunker;
        }
        match (
            char::from_u32(config.script_range_start),
            char::from_u32(config.script_range_end),
        ) {
            (Some(start), Some(end)) => {
                chunker.with_length(Box::new(ScriptAwareLength::new(start, end)))
            }
            _ => chunker,
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split a document, tagging each chunk with its position and the
    /// document metadata.
    pub fn chunk_document(&self, document: &NormalizedDocument) -> Vec<Chunk> {
        let texts = self.split_text(&document.text);
        let total_chunks = texts.len();
        debug!("Split {} chars into {} chunks", document.metadata.total_chars, total_chunks);

        texts
            .into_iter()
            .enumerate()
            .map(|(chunk_id, text)| Chunk {
                metadata: ChunkMetadata {
                    chunk_id,
                    total_chunks,
                    chunk_size: text.chars().count(),
                    document: document.metadata.clone(),
                },
                text,
            })
            .collect()
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn len(&self, text: &str) -> usize {
        self.length.measure(text)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if self.len(piece) < self.config.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short));
                short.clear();
            }
            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge(&short));
        }
        chunks
    }

    /// Greedily pack pieces into windows, keeping up to `chunk_overlap`
    /// units of trailing pieces as the head of the next window.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = self.len(piece);
            if total + len > size && !window.is_empty() {
                if let Some(chunk) = join(&window) {
                    chunks.push(chunk);
                }
                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let text: String = window.iter().map(|(piece, _)| *piece).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Split on `separator`, keeping each separator at the start of the piece
/// that follows it. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}
