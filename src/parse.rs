//! Recovering candidate records from free-form model replies.
//!
//! Models wrap JSON in code fences, prepend commentary, or answer with a bare
//! object when a list was asked for. The parser strips fences, slices out the
//! JSON document, wraps a lone object into a one-element array, and decodes
//! each element on its own so one malformed record does not cost its siblings.

use crate::error::ParseError;
use crate::models::RawEvent;
use crate::utils::looks_truncated;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?").expect("valid fence regex"));

/// Zero or more candidates from a listing reply.
///
/// `null`, an empty reply and `[]` all mean "no events" and are not errors.
///
/// # Errors
///
/// [`ParseError::Truncated`] when the reply ends mid-document,
/// [`ParseError::Malformed`] for any other invalid JSON and
/// [`ParseError::Shape`] when the document is neither an array nor an object.
pub fn parse_candidates(raw: &str) -> Result<Vec<RawEvent>, ParseError> {
    let unfenced = FENCE_RE.replace_all(raw, "");
    let body = isolate_json(unfenced.trim());
    if body.is_empty() || body == "null" {
        return Ok(Vec::new());
    }

    let document = if body.starts_with('{') {
        format!("[{body}]")
    } else {
        body.to_string()
    };

    let value: Value = serde_json::from_str(&document).map_err(|e| {
        if looks_truncated(&e) {
            ParseError::Truncated(e)
        } else {
            ParseError::Malformed(e)
        }
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(ParseError::Shape {
                expected: "a JSON array or object",
            });
        }
    };

    let mut candidates = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if item.is_null() {
            continue;
        }
        match serde_json::from_value::<RawEvent>(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!(index, error = %e, "Skipping candidate that does not match the event vocabulary"),
        }
    }
    Ok(candidates)
}

/// At most one candidate from a detail-page reply; `null` means "not an event page".
pub fn parse_single(raw: &str) -> Result<Option<RawEvent>, ParseError> {
    Ok(parse_candidates(raw)?.into_iter().next())
}

/// Slice from the first `[`/`{` to its last matching closer, dropping any
/// commentary around the document. Text with no JSON delimiters is returned as is.
fn isolate_json(text: &str) -> &str {
    if text == "null" {
        return text;
    }
    let Some(start) = text.find(['[', '{']) else {
        return text;
    };
    let closer = if text[start..].starts_with('[') { ']' } else { '}' };
    match text.rfind(closer) {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    }
}
