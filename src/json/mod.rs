//! JSON payload navigation
//!
//! Job variables routinely arrive as JSON encoded inside JSON strings
//! (sometimes base64-wrapped on top) because of upstream serialization
//! layers. This module is the single chokepoint that normalizes those
//! values into plain [`serde_json::Value`] trees before any business
//! logic touches them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

/// How many string-unwrap rounds are attempted before giving up on
/// pathological input.
pub const DEFAULT_UNWRAP_DEPTH: usize = 8;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("value is not valid JSON")]
    NotJson,
    #[error("byte buffer is not valid UTF-8 JSON")]
    NotUtf8Json,
}

/// Parse text into a JSON tree. Blank input is rejected.
fn parse_tree(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Decode a base64 string into UTF-8 text. Length must be a multiple of
/// four so that ordinary JSON strings are not mistaken for base64.
fn decode_base64_utf8(text: &str) -> Option<String> {
    if text.is_empty() || text.len() % 4 != 0 {
        return None;
    }
    let bytes = BASE64.decode(text).ok()?;
    String::from_utf8(bytes).ok()
}

/// Repeatedly replace a string node with the JSON it encodes.
///
/// Per round: base64-wrapped JSON wins over direct JSON, any other
/// string stops the loop. At most `max_depth` replacements happen.
pub fn unwrap_embedded(value: Value, max_depth: usize) -> Value {
    let mut current = value;
    for _ in 0..max_depth {
        let Some(text) = current.as_str() else {
            break;
        };
        if let Some(parsed) = decode_base64_utf8(text).as_deref().and_then(parse_tree) {
            current = parsed;
            continue;
        }
        if let Some(parsed) = parse_tree(text) {
            current = parsed;
            continue;
        }
        break;
    }
    current
}

/// Coerce an already-structured value, unwrapping embedded strings.
pub fn coerce(value: &Value) -> Value {
    unwrap_embedded(value.clone(), DEFAULT_UNWRAP_DEPTH)
}

/// Coerce raw text: direct JSON first, then base64-wrapped JSON.
pub fn coerce_str(text: &str) -> Result<Value, NavError> {
    if let Some(parsed) = parse_tree(text) {
        return Ok(unwrap_embedded(parsed, DEFAULT_UNWRAP_DEPTH));
    }
    if let Some(parsed) = decode_base64_utf8(text).as_deref().and_then(parse_tree) {
        return Ok(unwrap_embedded(parsed, DEFAULT_UNWRAP_DEPTH));
    }
    Err(NavError::NotJson)
}

/// Coerce a byte buffer holding UTF-8 JSON.
pub fn coerce_bytes(bytes: &[u8]) -> Result<Value, NavError> {
    let text = std::str::from_utf8(bytes).map_err(|_| NavError::NotUtf8Json)?;
    let parsed = parse_tree(text).ok_or(NavError::NotUtf8Json)?;
    Ok(unwrap_embedded(parsed, DEFAULT_UNWRAP_DEPTH))
}

/// Walk `path` segment by segment, unwrapping embedded JSON at each hop.
///
/// Objects resolve the segment as a key. Arrays try the segment on each
/// element in order and stop at the first element that owns the key.
/// Anything else after unwrapping is a dead end. An empty path returns
/// the unwrapped root.
pub fn find_path<S: AsRef<str>>(value: &Value, path: &[S]) -> Option<Value> {
    let mut current = unwrap_embedded(value.clone(), DEFAULT_UNWRAP_DEPTH);
    for segment in path {
        let segment = segment.as_ref();
        current = unwrap_embedded(current, DEFAULT_UNWRAP_DEPTH);
        let next = match &current {
            Value::Object(map) => map.get(segment).cloned(),
            Value::Array(items) => items.iter().find_map(|item| {
                let candidate = unwrap_embedded(item.clone(), DEFAULT_UNWRAP_DEPTH);
                candidate.get(segment).cloned()
            }),
            _ => None,
        };
        current = unwrap_embedded(next?, DEFAULT_UNWRAP_DEPTH);
    }
    Some(current)
}

/// Breadth-first search for the first property named `name`.
///
/// Object properties are visited in declaration order, array elements in
/// index order; string nodes encountered along the way are expanded
/// before being enqueued. The matched value is returned unwrapped.
pub fn find_deep(
    value: &Value,
    name: &str,
    case_insensitive: bool,
    max_depth: usize,
) -> Option<Value> {
    let matches = |candidate: &str| {
        if case_insensitive {
            candidate.eq_ignore_ascii_case(name)
        } else {
            candidate == name
        }
    };

    let root = unwrap_embedded(value.clone(), DEFAULT_UNWRAP_DEPTH);
    let mut queue = VecDeque::from([(root, 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth > max_depth {
            continue;
        }
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    if matches(&key) {
                        return Some(unwrap_embedded(child, DEFAULT_UNWRAP_DEPTH));
                    }
                    queue.push_back((unwrap_embedded(child, DEFAULT_UNWRAP_DEPTH), depth + 1));
                }
            }
            Value::Array(items) => {
                for item in items {
                    queue.push_back((unwrap_embedded(item, DEFAULT_UNWRAP_DEPTH), depth + 1));
                }
            }
            Value::String(text) => {
                let expanded = unwrap_embedded(Value::String(text), DEFAULT_UNWRAP_DEPTH);
                if !expanded.is_string() {
                    queue.push_back((expanded, depth + 1));
                }
            }
            _ => {}
        }
    }
    None
}
