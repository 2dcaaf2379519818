//! Tolerant recovery of envelope JSON from damaged or re-encoded text.
//!
//! Tools that round-trip metadata tend to quote, escape or wrap the stored
//! text. Recovery tries, in order: the text as JSON, the first balanced
//! `{...}` block in it that decodes, then one level of backslash
//! unescaping, repeating on nested strings and arrays up to a small depth.

use crate::signatures::EnvelopeWire;
use serde_json::{Map, Value};

/// Nested decoding levels before giving up.
const MAX_DEPTH: usize = 6;

/// Embedded `{...}` blocks tried per level.
const MAX_BLOCKS: usize = 32;

/// Field names that identify envelope text.
const FIELD_MARKERS: [&str; 3] = ["signature", "publickey", "documenthash"];

/// Recover an envelope from arbitrary text.
///
/// Returns `None` unless the result has at least one signature field.
pub fn parse_envelope(text: &str) -> Option<EnvelopeWire> {
    parse_at_depth(text, 0)
}

/// Whether `text` mentions one of the signature field names.
pub fn has_field_marker(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    FIELD_MARKERS.iter().any(|m| lower.contains(m))
}

fn parse_at_depth(text: &str, depth: usize) -> Option<EnvelopeWire> {
    if depth > MAX_DEPTH {
        return None;
    }
    let cleaned = strip_controls(text.trim());
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if let Some(wire) = from_value(value, depth) {
            return Some(wire);
        }
    }

    let embedded = json_blocks(&cleaned)
        .filter(|block| block.len() < cleaned.len())
        .take(MAX_BLOCKS)
        .find_map(|block| {
            serde_json::from_str::<Value>(block)
                .ok()
                .and_then(|v| from_value(v, depth))
        });
    if embedded.is_some() {
        return embedded;
    }

    let unescaped = unescape(&cleaned);
    if unescaped != cleaned {
        return parse_at_depth(&unescaped, depth + 1);
    }
    None
}

fn from_value(value: Value, depth: usize) -> Option<EnvelopeWire> {
    match value {
        Value::Object(map) => {
            let wire: EnvelopeWire = serde_json::from_value(Value::Object(canonical_keys(map))).ok()?;
            wire.has_signature_field().then_some(wire)
        },
        Value::String(inner) => parse_at_depth(&inner, depth + 1),
        Value::Array(items) => items.into_iter().find_map(|item| from_value(item, depth + 1)),
        _ => None,
    }
}

/// Map case and separator variants of field names onto the wire names.
fn canonical_keys(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        let folded: String = key
            .trim()
            .trim_start_matches('/')
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        let canonical = match folded.as_str() {
            "signature" => "signature",
            "publickey" => "publicKey",
            "documenthash" => "documentHash",
            "signingdate" => "signingDate",
            "author" => "author",
            "subject" => "subject",
            "id" | "documentid" => "id",
            "formatversion" => "formatVersion",
            _ => continue,
        };
        // The exact spelling wins over variants
        if key == canonical || !out.contains_key(canonical) {
            out.insert(canonical.to_string(), value);
        }
    }
    out
}

/// Balanced `{...}` blocks in order of their opening brace, respecting
/// JSON string quoting. Blocks nested in an earlier one are yielded too.
pub fn json_blocks(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_block(text, start))
}

fn balanced_block(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            },
            _ => {},
        }
    }
    None
}

/// Remove one level of backslash escaping of quotes, backslashes and slashes.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\\' | '/' | '\'') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Drop control characters and byte order marks.
fn strip_controls(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && *c != '\u{feff}')
        .collect()
}
