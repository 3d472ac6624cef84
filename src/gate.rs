//! The last check before a write: duplicate and expiry screening.
//!
//! 1. **Duplicate**: a stored row with exactly the same title (case-sensitive)
//!    skips the candidate. The lookup and the insert are two separate store
//!    round-trips, so two overlapping runs can both miss and both insert. A
//!    unique index on `events.title` turns the second insert into a
//!    [`StoreError::Conflict`], which is reported as a duplicate here.
//! 2. **Expiry** (detail-page flow only): an event whose end (or start, when
//!    it has no end) is strictly before today is skipped. Free-text dates
//!    cannot be compared and pass.
//! 3. **Insert**: stamped with `created_at`, missing dates resolved to today.
//!
//! Each outcome concerns one candidate only.

use crate::error::StoreError;
use crate::models::CanonicalEvent;
use crate::store::EventStore;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    Enforce,
    Skip,
}

#[derive(Debug)]
pub enum WriteOutcome {
    Inserted,
    SkippedDuplicate,
    SkippedExpired,
    /// No store credentials were configured for this run.
    StoreUnavailable,
    Failed(StoreError),
}

impl WriteOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, WriteOutcome::Inserted)
    }
}

/// Whether the event is over before `today`. Unparseable dates never are.
pub fn is_expired(event: &CanonicalEvent, today: NaiveDate) -> bool {
    match event.effective_end() {
        Some(end) => match end.as_day() {
            Some(day) => day < today,
            None => {
                debug!(title = %event.title, date = %end, "Free-text date; expiry not screened");
                false
            }
        },
        None => false,
    }
}

/// Screen `event` and write it if it passes.
///
/// The duplicate lookup runs first, then the expiry check (only with
/// [`ExpiryCheck::Enforce`]), then the insert. A store-side conflict on insert
/// is reported as [`WriteOutcome::SkippedDuplicate`].
///
/// # Arguments
///
/// * `store` - The events table; `None` when no credentials were configured
/// * `event` - The normalized event to write
/// * `expiry` - Whether past events are skipped
/// * `now` - The `created_at` stamp for the row
/// * `today` - Reference day for expiry and for resolving a missing date
///
/// # Returns
///
/// The [`WriteOutcome`] for this one event. Store failures are logged and
/// returned as [`WriteOutcome::Failed`]; they never abort the caller.
pub async fn submit<S: EventStore>(
    store: Option<&S>,
    event: &CanonicalEvent,
    expiry: ExpiryCheck,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> WriteOutcome {
    let Some(store) = store else {
        debug!(title = %event.title, "No store configured; write skipped");
        return WriteOutcome::StoreUnavailable;
    };

    match store.find_by_title(&event.title).await {
        Ok(Some(_)) => {
            info!(title = %event.title, "Skipped (duplicate)");
            return WriteOutcome::SkippedDuplicate;
        }
        Ok(None) => {}
        Err(e) => {
            error!(title = %event.title, error = %e, "Duplicate lookup failed");
            return WriteOutcome::Failed(e);
        }
    }

    if expiry == ExpiryCheck::Enforce && is_expired(event, today) {
        info!(title = %event.title, "Skipped (expired)");
        return WriteOutcome::SkippedExpired;
    }

    match store.insert(&event.to_row(today, now)).await {
        Ok(()) => {
            info!(title = %event.title, category = %event.category, "Uploaded");
            WriteOutcome::Inserted
        }
        Err(StoreError::Conflict { title }) => {
            warn!(%title, "Store reports an existing row; another run inserted it first");
            WriteOutcome::SkippedDuplicate
        }
        Err(e) => {
            error!(title = %event.title, error = %e, "Error uploading event");
            WriteOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, EventDate};
    use crate::store::MemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn event(title: &str, end: Option<&str>) -> CanonicalEvent {
        let end_date = end.and_then(EventDate::parse);
        CanonicalEvent {
            title: title.to_string(),
            description: None,
            date: end_date.clone(),
            end_date,
            location: None,
            address: None,
            category: Category::Culture,
            image_url: Category::Culture.default_image().to_string(),
            source_url: "https://example.com/agenda/obra".to_string(),
            contact_info: None,
            city: None,
        }
    }

    async fn submit_one(store: &MemoryStore, event: &CanonicalEvent, expiry: ExpiryCheck) -> WriteOutcome {
        submit(Some(store), event, expiry, Utc::now(), today()).await
    }

    #[tokio::test]
    async fn test_duplicate_title_is_skipped() {
        let store = MemoryStore::new();
        let first = event("Noche de Tango", Some("2026-12-01"));
        assert!(submit_one(&store, &first, ExpiryCheck::Skip).await.is_inserted());

        let outcome = submit_one(&store, &first, ExpiryCheck::Skip).await;
        assert!(matches!(outcome, WriteOutcome::SkippedDuplicate));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_check_is_case_sensitive() {
        let store = MemoryStore::new();
        submit_one(&store, &event("Noche de Tango", None), ExpiryCheck::Skip).await;
        let outcome = submit_one(&store, &event("NOCHE DE TANGO", None), ExpiryCheck::Skip).await;
        assert!(outcome.is_inserted());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_event_is_skipped() {
        let store = MemoryStore::new();
        let outcome = submit_one(&store, &event("Ya pasó", Some("2026-10-17")), ExpiryCheck::Enforce).await;
        assert!(matches!(outcome, WriteOutcome::SkippedExpired));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_event_ending_today_or_later_is_written() {
        let store = MemoryStore::new();
        for (title, end) in [("Hoy", "2026-10-18"), ("Mañana", "2026-10-19")] {
            let outcome = submit_one(&store, &event(title, Some(end)), ExpiryCheck::Enforce).await;
            assert!(outcome.is_inserted(), "{title}");
        }
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_expiry_not_enforced_for_listing_flow() {
        let store = MemoryStore::new();
        let outcome = submit_one(&store, &event("Ya pasó", Some("2026-10-01")), ExpiryCheck::Skip).await;
        assert!(outcome.is_inserted());
    }

    #[test]
    fn test_is_expired_uses_end_date_then_start_date() {
        let mut ev = event("Festival", Some("2026-10-10"));
        ev.end_date = EventDate::parse("2026-10-20");
        assert!(!is_expired(&ev, today()));

        ev.end_date = None;
        assert!(is_expired(&ev, today()));

        ev.date = EventDate::parse("Próximamente");
        assert!(!is_expired(&ev, today()));

        ev.date = None;
        assert!(!is_expired(&ev, today()));
    }

    #[tokio::test]
    async fn test_missing_store_is_reported() {
        let outcome = submit::<MemoryStore>(
            None,
            &event("Sin tienda", None),
            ExpiryCheck::Skip,
            Utc::now(),
            today(),
        )
        .await;
        assert!(matches!(outcome, WriteOutcome::StoreUnavailable));
    }

    #[tokio::test]
    async fn test_written_row_resolves_dates() {
        let store = MemoryStore::new();
        submit_one(&store, &event("Sin fecha", None), ExpiryCheck::Enforce).await;
        let rows = store.rows();
        assert_eq!(rows[0].date, "2026-10-18");
        assert_eq!(rows[0].end_date, "2026-10-18");
    }
}
