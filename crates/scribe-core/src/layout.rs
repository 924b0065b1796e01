//! Layout vocabulary produced by layout-aware OCR.

use crate::types::BBox;
use serde::{Deserialize, Serialize};

/// Category of a layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutCategory {
    Caption,
    Footnote,
    Formula,
    #[serde(rename = "List-item")]
    ListItem,
    #[serde(rename = "Page-footer")]
    PageFooter,
    #[serde(rename = "Page-header")]
    PageHeader,
    Picture,
    #[serde(rename = "Section-header")]
    SectionHeader,
    Table,
    Text,
    Title,
    /// Anything outside the fixed vocabulary; treated as text.
    #[serde(other)]
    Other,
}

impl LayoutCategory {
    /// The fixed vocabulary, in the order given to the OCR model.
    pub const VOCABULARY: [LayoutCategory; 11] = [
        LayoutCategory::Caption,
        LayoutCategory::Footnote,
        LayoutCategory::Formula,
        LayoutCategory::ListItem,
        LayoutCategory::PageFooter,
        LayoutCategory::PageHeader,
        LayoutCategory::Picture,
        LayoutCategory::SectionHeader,
        LayoutCategory::Table,
        LayoutCategory::Text,
        LayoutCategory::Title,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutCategory::Caption => "Caption",
            LayoutCategory::Footnote => "Footnote",
            LayoutCategory::Formula => "Formula",
            LayoutCategory::ListItem => "List-item",
            LayoutCategory::PageFooter => "Page-footer",
            LayoutCategory::PageHeader => "Page-header",
            LayoutCategory::Picture => "Picture",
            LayoutCategory::SectionHeader => "Section-header",
            LayoutCategory::Table => "Table",
            LayoutCategory::Text => "Text",
            LayoutCategory::Title => "Title",
            LayoutCategory::Other => "Other",
        }
    }

    /// Text format the OCR model is asked to emit for this category.
    pub fn text_format(&self) -> Option<&'static str> {
        match self {
            LayoutCategory::Table => Some("html"),
            LayoutCategory::Formula => Some("latex"),
            LayoutCategory::Picture => None,
            _ => Some("markdown"),
        }
    }
}

impl std::fmt::Display for LayoutCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a page layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub category: LayoutCategory,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

impl LayoutElement {
    /// Element text, trimmed. Pictures never carry text.
    pub fn text(&self) -> &str {
        if self.category == LayoutCategory::Picture {
            return "";
        }
        self.text.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Structured layout of one image, elements in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub elements: Vec<LayoutElement>,
}

impl LayoutDocument {
    /// Parse raw model output into a layout.
    ///
    /// Accepts a bare array of elements or an object with an `elements`
    /// array, optionally wrapped in a markdown code fence. Returns `None`
    /// when the output is not JSON at all. Malformed elements are skipped.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw)).ok()?;

        let elements = match value {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => match map.remove("elements") {
                Some(serde_json::Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => return None,
        };

        let elements = elements
            .into_iter()
            .filter_map(|e| serde_json::from_value::<LayoutElement>(e).ok())
            .collect();

        Some(Self { elements })
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn count(&self, category: LayoutCategory) -> usize {
        self.elements
            .iter()
            .filter(|e| e.category == category)
            .count()
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_with_elements() {
        let raw = r##"{"elements": [
            {"category": "Title", "text": "# Report", "bbox": [0, 0, 100, 20]},
            {"category": "Table", "text": "<table><tr><td>1</td></tr></table>", "bbox": [0, 30, 100, 80]},
            {"category": "Picture", "bbox": [0, 90, 50, 120]}
        ]}"##;

        let layout = LayoutDocument::parse(raw).unwrap();
        assert_eq!(layout.elements.len(), 3);
        assert_eq!(layout.elements[1].category, LayoutCategory::Table);
        assert_eq!(layout.elements[1].bbox, Some([0.0, 30.0, 100.0, 80.0]));
        assert_eq!(layout.elements[2].text(), "");
        assert_eq!(layout.count(LayoutCategory::Table), 1);
    }

    #[test]
    fn test_parse_fenced_array() {
        let raw = "```json\n[{\"category\": \"Section-header\", \"text\": \"Intro\"}]\n```";
        let layout = LayoutDocument::parse(raw).unwrap();
        assert_eq!(layout.elements[0].category, LayoutCategory::SectionHeader);
    }

    #[test]
    fn test_parse_non_json_is_none() {
        assert!(LayoutDocument::parse("just some recognized words").is_none());
        assert!(LayoutDocument::parse("\"a string\"").is_none());
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let layout = LayoutDocument::parse(r#"[{"category": "Sidebar", "text": "x"}]"#).unwrap();
        assert_eq!(layout.elements[0].category, LayoutCategory::Other);
        assert_eq!(layout.elements[0].category.text_format(), Some("markdown"));
    }

    #[test]
    fn test_category_formats() {
        assert_eq!(LayoutCategory::Table.text_format(), Some("html"));
        assert_eq!(LayoutCategory::Formula.text_format(), Some("latex"));
        assert_eq!(LayoutCategory::Picture.text_format(), None);
        assert_eq!(LayoutCategory::VOCABULARY.len(), 11);
    }
}
