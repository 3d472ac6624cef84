//! Mapping candidate records onto the canonical event shape.
//!
//! [`normalize`] is the single bridge from the model's vocabulary to the
//! stored one. Every source (city pages, the national agenda, detail pages
//! and the detail-flow fallback) goes through it, so defaults are applied the
//! same way everywhere:
//!
//! | field | rule |
//! |-------|------|
//! | `date` | model start date, else resolved to today when written |
//! | `end_date` | model end date, else `date` |
//! | `address` | model address, else the venue |
//! | `category` | validated against the closed list, else `other` |
//! | `image_url` | model image, else the category's stock image |
//! | `source_url` | model deep link (resolved against the page), else the page |

use crate::error::NormalizeError;
use crate::models::{CanonicalEvent, Category, EventDate, RawEvent};
use url::Url;

/// Longest description kept, in sentences.
pub const MAX_DESCRIPTION_SENTENCES: usize = 3;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// The page that was scraped.
    pub page_url: &'a str,
    /// The city being collected for, when running per city.
    pub city: Option<&'a str>,
}

/// Map a model candidate onto the canonical event shape.
///
/// Applies the defaults in the module table: blank strings and spelled-out
/// nulls count as absent, the end date falls back to the start date, the
/// venue stands in for a missing address, unknown categories become
/// [`Category::Other`], and links are resolved against `ctx.page_url`.
///
/// # Arguments
///
/// * `raw` - The candidate as the model phrased it
/// * `ctx` - The page it was read from and the city being collected, if any
///
/// # Returns
///
/// The [`CanonicalEvent`], or [`NormalizeError::MissingTitle`] when the
/// candidate has no usable title.
pub fn normalize(raw: RawEvent, ctx: &SourceContext<'_>) -> Result<CanonicalEvent, NormalizeError> {
    let title = clean(raw.title).ok_or(NormalizeError::MissingTitle)?;

    let date = clean(raw.date)
        .or_else(|| clean(raw.start_date))
        .and_then(|d| EventDate::parse(&d));
    let end_date = clean(raw.end_date)
        .and_then(|d| EventDate::parse(&d))
        .or_else(|| date.clone());

    let location = clean(raw.venue).or_else(|| clean(raw.location));
    let address = clean(raw.address).or_else(|| location.clone());

    let category = Category::from_label(raw.category.as_deref());
    let image_url = clean(raw.image_url).unwrap_or_else(|| category.default_image().to_string());

    let source_url = clean(raw.url)
        .or_else(|| clean(raw.source_url))
        .and_then(|link| resolve_link(ctx.page_url, &link))
        .unwrap_or_else(|| ctx.page_url.to_string());

    let description = clean(raw.description).map(|d| limit_sentences(&d, MAX_DESCRIPTION_SENTENCES));
    let city = clean(raw.city).or_else(|| ctx.city.map(str::to_string));

    Ok(CanonicalEvent {
        title,
        description,
        date,
        end_date,
        location,
        address,
        category,
        image_url,
        source_url,
        contact_info: clean(raw.contact_info),
        city,
    })
}

/// Trimmed value, with blanks and spelled-out nulls treated as absent.
fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_link(page_url: &str, link: &str) -> Option<String> {
    let resolved = match Url::parse(link) {
        Ok(url) => url,
        Err(_) => Url::parse(page_url).ok()?.join(link).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// The first `max` sentences of `text`.
fn limit_sentences(text: &str, max: usize) -> String {
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_none_or(|(_, next)| next.is_whitespace()) {
            count += 1;
            if count == max {
                return text[..idx + ch.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}
