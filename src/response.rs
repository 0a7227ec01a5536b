//! Business-response classification
//!
//! The business endpoint has no fixed response schema. Bodies are
//! classified as JSON, XML, or opaque text from the content type and the
//! first non-whitespace character, and response headers are flattened
//! into a case-insensitive multi-value map for the engine.

use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Coarse body classification used when shaping output variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Xml,
    Text,
}

impl BodyKind {
    /// Engine-side type tag for variables carrying this body.
    pub fn type_tag(self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Xml | BodyKind::Text => "string",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Xml => "xml",
            BodyKind::Text => "string",
        }
    }
}

/// Classify a response body. JSON wins over XML when both heuristics
/// would match (a "json" content type is authoritative).
pub fn classify(content_type: Option<&str>, body: &str) -> BodyKind {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return BodyKind::Text;
    }
    let type_contains = |needle: &str| {
        content_type
            .map(|ct| ct.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    };
    if type_contains("json") || trimmed.starts_with('{') || trimmed.starts_with('[') {
        BodyKind::Json
    } else if type_contains("xml") || trimmed.starts_with('<') {
        BodyKind::Xml
    } else {
        BodyKind::Text
    }
}

/// Flatten response headers into a lower-cased multi-value map.
///
/// All values per name are preserved in arrival order; nothing is
/// collapsed or deduplicated.
pub fn extract_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let text = value.to_str().unwrap_or_default().to_string();
        map.entry(name.as_str().to_ascii_lowercase())
            .or_default()
            .push(text);
    }
    map
}
