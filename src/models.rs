//! Data models for extracted events and their stored representation.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`RawEvent`]: a candidate record exactly as the language model phrased it
//! - [`CanonicalEvent`]: the normalized, immutable event built from a candidate
//! - [`EventRow`]: the store-ready projection written to the `events` table
//! - [`Category`] and [`EventDate`]: the closed category vocabulary and the
//!   parsed-or-verbatim date type
//!
//! The only bridge from the model vocabulary to the store vocabulary is
//! [`crate::normalize::normalize`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// The closed set of event categories accepted by the `events` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Music,
    Culture,
    Outdoors,
    Party,
    Food,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Music,
        Category::Culture,
        Category::Outdoors,
        Category::Party,
        Category::Food,
        Category::Other,
    ];

    /// Resolve a model-supplied label. Anything outside the vocabulary,
    /// including a missing label, becomes [`Category::Other`].
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_lowercase()).as_deref() {
            Some("music") => Category::Music,
            Some("culture") => Category::Culture,
            Some("outdoors") => Category::Outdoors,
            Some("party") => Category::Party,
            Some("food") => Category::Food,
            _ => Category::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Music => "music",
            Category::Culture => "culture",
            Category::Outdoors => "outdoors",
            Category::Party => "party",
            Category::Food => "food",
            Category::Other => "other",
        }
    }

    /// Stock image used when the model found no image for the event.
    pub fn default_image(&self) -> &'static str {
        match self {
            Category::Music => {
                "https://images.unsplash.com/photo-1514525253440-b393452e8d26?auto=format&fit=crop&q=80&w=800"
            }
            Category::Food => {
                "https://images.unsplash.com/photo-1517248135467-4c7edcad34c4?auto=format&fit=crop&q=80&w=800"
            }
            Category::Culture => {
                "https://images.unsplash.com/photo-1460661419201-fd4cecdf8a8b?auto=format&fit=crop&q=80&w=800"
            }
            Category::Outdoors => {
                "https://images.unsplash.com/photo-1501555088652-021faa106b9b?auto=format&fit=crop&q=80&w=800"
            }
            Category::Party => {
                "https://images.unsplash.com/photo-1566737236500-c8ac43014a67?auto=format&fit=crop&q=80&w=800"
            }
            Category::Other => {
                "https://images.unsplash.com/photo-1492684223066-81342ee5ff30?auto=format&fit=crop&q=80&w=800"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A start or end date as reported by the model.
///
/// Dates the model wrote in a recognizable numeric form are parsed into a
/// calendar date; anything else ("Próximamente", "todos los viernes") is kept
/// verbatim and cannot take part in expiry screening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDate {
    Day(NaiveDate),
    Text(String),
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

impl EventDate {
    /// Parse a model date. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        for fmt in DATE_FORMATS {
            if let Ok(day) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(EventDate::Day(day));
            }
        }
        // ISO date-time such as 2025-05-06T20:00:00-05:00
        if let Some(prefix) = trimmed.get(..10) {
            if let Ok(day) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(EventDate::Day(day));
            }
        }
        Some(EventDate::Text(trimmed.to_string()))
    }

    pub fn as_day(&self) -> Option<NaiveDate> {
        match self {
            EventDate::Day(day) => Some(*day),
            EventDate::Text(_) => None,
        }
    }
}

impl fmt::Display for EventDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventDate::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            EventDate::Text(text) => f.write_str(text),
        }
    }
}

impl Serialize for EventDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A candidate event in the model's field vocabulary.
///
/// Every field is optional because the model guarantees nothing. Unknown keys
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    pub title: Option<String>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub source_url: Option<String>,
    pub contact_info: Option<String>,
}

/// A normalized event, ready to be screened and written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEvent {
    pub title: String,
    pub description: Option<String>,
    /// `None` resolves to the day of the write.
    pub date: Option<EventDate>,
    pub end_date: Option<EventDate>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub category: Category,
    pub image_url: String,
    pub source_url: String,
    pub contact_info: Option<String>,
    pub city: Option<String>,
}

impl CanonicalEvent {
    /// The date an event is over by: its end date, else its start date.
    pub fn effective_end(&self) -> Option<&EventDate> {
        self.end_date.as_ref().or(self.date.as_ref())
    }

    /// Project into the stored shape, resolving missing dates to `today`.
    pub fn to_row(&self, today: NaiveDate, created_at: DateTime<Utc>) -> EventRow {
        let date = self
            .date
            .clone()
            .unwrap_or(EventDate::Day(today))
            .to_string();
        let end_date = self
            .end_date
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| date.clone());

        EventRow {
            title: self.title.clone(),
            description: self.description.clone(),
            date,
            end_date,
            location: self.location.clone(),
            address: self.address.clone(),
            category: self.category,
            image_url: self.image_url.clone(),
            source_url: self.source_url.clone(),
            contact_info: self.contact_info.clone(),
            city: self.city.clone(),
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// One row of the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: String,
    pub end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub category: Category,
    pub image_url: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> CanonicalEvent {
        CanonicalEvent {
            title: "Festival de Jazz".to_string(),
            description: None,
            date: None,
            end_date: None,
            location: Some("Teatro Colón".to_string()),
            address: Some("Teatro Colón".to_string()),
            category: Category::Music,
            image_url: Category::Music.default_image().to_string(),
            source_url: "https://example.com/agenda".to_string(),
            contact_info: None,
            city: Some("Bogotá".to_string()),
        }
    }

    #[test]
    fn test_category_from_label_known_values() {
        assert_eq!(Category::from_label(Some("music")), Category::Music);
        assert_eq!(Category::from_label(Some("  Food ")), Category::Food);
        assert_eq!(Category::from_label(Some("OUTDOORS")), Category::Outdoors);
    }

    #[test]
    fn test_category_from_label_unknown_is_other() {
        assert_eq!(Category::from_label(Some("sports")), Category::Other);
        assert_eq!(Category::from_label(Some("música")), Category::Other);
        assert_eq!(Category::from_label(Some("")), Category::Other);
        assert_eq!(Category::from_label(None), Category::Other);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Outdoors).unwrap();
        assert_eq!(json, "\"outdoors\"");
    }

    #[test]
    fn test_every_category_has_distinct_default_image() {
        let images: std::collections::HashSet<_> =
            Category::ALL.iter().map(|c| c.default_image()).collect();
        assert_eq!(images.len(), Category::ALL.len());
        assert!(images.iter().all(|url| url.starts_with("https://")));
    }

    #[test]
    fn test_event_date_parses_numeric_forms() {
        let expected = EventDate::Day(NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
        assert_eq!(EventDate::parse("2025-05-06"), Some(expected.clone()));
        assert_eq!(EventDate::parse("2025/05/06"), Some(expected.clone()));
        assert_eq!(EventDate::parse("06/05/2025"), Some(expected.clone()));
        assert_eq!(EventDate::parse("2025-05-06T20:00:00-05:00"), Some(expected));
    }

    #[test]
    fn test_event_date_keeps_free_text() {
        assert_eq!(
            EventDate::parse(" Próximamente "),
            Some(EventDate::Text("Próximamente".to_string()))
        );
        assert_eq!(EventDate::parse("   "), None);
    }

    #[test]
    fn test_to_row_resolves_missing_dates_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let row = sample_event().to_row(today, now);

        assert_eq!(row.date, "2026-03-01");
        assert_eq!(row.end_date, "2026-03-01");
        assert_eq!(row.created_at, now.to_rfc3339());
    }

    #[test]
    fn test_row_serialization_omits_absent_fields() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let row = sample_event().to_row(today, Utc::now());
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["category"], "music");
        assert!(json.get("description").is_none());
        assert!(json.get("contact_info").is_none());
        assert_eq!(json["city"], "Bogotá");
    }
}
