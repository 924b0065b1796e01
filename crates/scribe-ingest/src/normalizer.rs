//! Merges extracted content items into one annotated document.

use scribe_core::{ContentType, DocumentMetadata, ExtractionResult, Metadata, NormalizedDocument};
use sha2::{Digest, Sha256};

pub const TABLE_OPEN: &str = "[TABLE]";
pub const TABLE_CLOSE: &str = "[/TABLE]";
pub const FORMULA_OPEN: &str = "[FORMULA]";
pub const FORMULA_CLOSE: &str = "[/FORMULA]";

/// Extractor metadata keys that map onto typed document fields.
const COUNT_KEYS: [&str; 4] = [
    "layout_elements",
    "text_elements",
    "table_elements",
    "formula_elements",
];

fn take_count(extra: &mut Metadata, key: &str) -> usize {
    extra
        .remove(key)
        .and_then(|v| v.as_u64())
        .unwrap_or_default() as usize
}

/// Render items into a single text and derive document metadata.
///
/// Tables and formulas are wrapped in bracketed markers on their own lines;
/// every other item is emitted as-is. Each item ends with a blank line.
pub fn normalize(extraction: &ExtractionResult, file_size_mb: f64) -> NormalizedDocument {
    let mut text = String::new();
    let mut has_tables = false;
    let mut has_formulas = false;
    let mut has_text_blocks = false;

    for item in &extraction.content {
        match item.kind {
            ContentType::Table => {
                has_tables = true;
                text.push_str(&format!(
                    "\n{}\n{}\n{}\n\n",
                    TABLE_OPEN, item.content, TABLE_CLOSE
                ));
            }
            ContentType::Formula => {
                has_formulas = true;
                text.push_str(&format!(
                    "\n{}\n{}\n{}\n\n",
                    FORMULA_OPEN, item.content, FORMULA_CLOSE
                ));
            }
            ContentType::TextBlock => {
                has_text_blocks = true;
                text.push_str(&item.content);
                text.push_str("\n\n");
            }
            ContentType::Text | ContentType::RawText => {
                text.push_str(&item.content);
                text.push_str("\n\n");
            }
        }
    }

    let mut extra = extraction.metadata.clone();
    let has_layout_info = extra
        .get("has_layout_info")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let ocr_flag = extra
        .remove("ocr_enhanced")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let [layout_elements, text_elements, table_elements, formula_elements] =
        COUNT_KEYS.map(|key| take_count(&mut extra, key));

    let document_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
    let total_chars = text.chars().count();

    NormalizedDocument {
        text,
        metadata: DocumentMetadata {
            document_hash,
            has_tables,
            has_formulas,
            has_text_blocks,
            ocr_enhanced: ocr_flag || has_layout_info,
            layout_aware: true,
            layout_elements,
            text_elements,
            table_elements,
            formula_elements,
            file_size_mb,
            total_chars,
            extra,
        },
    }
}
