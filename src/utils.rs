//! Small helpers shared across the pipeline: clock access, log-safe
//! truncation, and JSON error classification.

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Today's calendar date in the local timezone.
///
/// Expiry decisions and the missing-date fallback both use this, so an event
/// dated "today" is never treated as past.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Insertion timestamp for new rows.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and the number of dropped bytes appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When a model reply is cut off by a token limit the document ends early and
/// parsing fails with an EOF error rather than a syntax error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}
