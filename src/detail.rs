//! Detail-page flow: one listing page, one event per linked page.
//!
//! The listing is scanned for agenda deep links ([`collect_agenda_links`]),
//! capped at [`crate::config::DETAIL_LINK_CAP`]. Each link is fetched in turn,
//! with a polite pause between fetches, and the model is asked for exactly
//! one event or `null`. Detail events are screened for expiry as well as for
//! duplicates.
//!
//! If nothing was inserted after every link was visited, a single static
//! record pointing back at the listing is written so a configured source
//! never ends a run silently empty.

use crate::api::AskAsync;
use crate::extract::{Pipeline, WriteTally};
use crate::fetch::PageFetcher;
use crate::gate::{ExpiryCheck, WriteOutcome};
use crate::models::{Category, RawEvent};
use crate::normalize::SourceContext;
use crate::prompt::build_detail_prompt;
use crate::store::EventStore;
use crate::text::collect_agenda_links;
use crate::utils::today;
use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// What one listing produced.
#[derive(Debug)]
pub struct DetailReport {
    pub listing_url: String,
    pub links_visited: usize,
    pub writes: WriteTally,
    /// What the gate decided for the fallback record, when one was needed.
    pub fallback: Option<WriteOutcome>,
}

/// The static record written when a listing yields nothing.
pub fn fallback_candidate(listing_url: &str) -> RawEvent {
    let site = Url::parse(listing_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| listing_url.to_string());

    RawEvent {
        title: Some(format!("Agenda cultural de {site}")),
        description: Some(format!(
            "Consulta la programación completa de eventos en {site}. \
             La agenda se actualiza con frecuencia."
        )),
        date: Some(today().format("%Y-%m-%d").to_string()),
        category: Some(Category::Culture.as_str().to_string()),
        url: Some(listing_url.to_string()),
        ..RawEvent::default()
    }
}

impl<F, C, S> Pipeline<F, C, S>
where
    F: PageFetcher,
    C: AskAsync<Response = String>,
    S: EventStore,
{
    /// Run the detail-page flow for every listing, one after another.
    pub async fn run_listings(&self, listings: &[String]) -> Vec<DetailReport> {
        let mut reports = Vec::with_capacity(listings.len());
        for listing in listings {
            reports.push(self.run_detail(listing).await);
        }
        reports
    }

    /// Extract one event per agenda link on `listing_url`.
    ///
    /// Links are visited sequentially with [`RunSettings::detail_delay`]
    /// between fetches. Without a model no page is fetched at all. When no
    /// event ends up inserted, the fallback record for the listing is
    /// submitted instead.
    ///
    /// # Returns
    ///
    /// A [`DetailReport`] with the number of links visited, the gate's
    /// decisions for the linked pages and, if it was needed, the fallback's.
    ///
    /// [`RunSettings::detail_delay`]: crate::config::RunSettings::detail_delay
    #[instrument(level = "info", skip(self))]
    pub async fn run_detail(&self, listing_url: &str) -> DetailReport {
        let settings = self.settings();
        let links = if !self.has_model() {
            warn!(%listing_url, "No model configured; agenda links not visited");
            Vec::new()
        } else {
            match self.fetch_markup(listing_url).await {
                Ok(html) => collect_agenda_links(&html, listing_url, &settings.agenda_segment, settings.detail_link_cap),
                Err(_) => Vec::new(),
            }
        };
        if links.is_empty() && self.has_model() {
            warn!(%listing_url, "No agenda links found on listing");
        }
        info!(count = links.len(), "Visiting agenda links");

        let delay = settings.detail_delay;
        let outcomes: Vec<Option<WriteOutcome>> = stream::iter(links.iter().enumerate())
            .then(|(i, link)| async move {
                if i > 0 && !delay.is_zero() {
                    sleep(delay).await;
                }
                self.process_link(link).await
            })
            .collect()
            .await;

        let mut writes = WriteTally::default();
        for outcome in outcomes.iter().flatten() {
            writes.record(outcome);
        }

        let fallback = if writes.inserted == 0 {
            self.write_fallback(listing_url).await
        } else {
            None
        };

        info!(
            links = links.len(),
            inserted = writes.inserted,
            duplicates = writes.duplicates,
            expired = writes.expired,
            fallback = fallback.is_some(),
            "Listing done"
        );
        DetailReport {
            listing_url: listing_url.to_string(),
            links_visited: links.len(),
            writes,
            fallback,
        }
    }

    /// Extract and write the event on one detail page. `None` when the page
    /// yielded no event.
    #[instrument(level = "info", skip(self))]
    async fn process_link(&self, link: &str) -> Option<WriteOutcome> {
        let text = self.fetch_text(link, self.settings().detail_text_chars).await.ok()?;
        let reply = self.complete(&build_detail_prompt(&text, link)).await?;
        let Some(candidate) = self.single_from(&reply) else {
            debug!(%link, "Not an event page");
            return None;
        };

        let ctx = SourceContext {
            page_url: link,
            city: None,
        };
        self.write_candidate(candidate, &ctx, ExpiryCheck::Enforce).await
    }

    /// Submit the fallback record; `None` if it could not be normalized.
    async fn write_fallback(&self, listing_url: &str) -> Option<WriteOutcome> {
        info!(%listing_url, "No events written; adding fallback record");
        let ctx = SourceContext {
            page_url: listing_url,
            city: None,
        };
        self.write_candidate(fallback_candidate(listing_url), &ctx, ExpiryCheck::Skip)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use crate::extract::testing::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    const LISTING: &str = "https://agenda.example/es/agenda";

    fn settings() -> RunSettings {
        RunSettings {
            detail_delay: Duration::ZERO,
            ..RunSettings::default()
        }
    }

    fn listing_html(n: usize) -> String {
        let links: String = (0..n)
            .map(|i| format!("<a href=\"/es/agenda/evento-{i}\">Evento {i}</a>"))
            .collect();
        format!("<html><body>{links}<a href=\"/es/agenda?page=2\">Más</a></body></html>")
    }

    fn fetcher_with_links(n: usize) -> ScriptedFetcher {
        (0..n).fold(
            ScriptedFetcher::default().with_page(LISTING, &listing_html(n)),
            |fetcher, i| {
                fetcher.with_page(
                    &format!("https://agenda.example/es/agenda/evento-{i}"),
                    &page(&format!("DETAIL-{i} Obra de teatro")),
                )
            },
        )
    }

    #[test]
    fn test_fallback_candidate_shape() {
        let raw = fallback_candidate(LISTING);
        assert_eq!(raw.title.as_deref(), Some("Agenda cultural de agenda.example"));
        assert_eq!(raw.category.as_deref(), Some("culture"));
        assert_eq!(raw.url.as_deref(), Some(LISTING));
    }

    #[tokio::test]
    async fn test_all_null_replies_write_exactly_one_fallback() {
        let p = Pipeline::new(
            fetcher_with_links(12),
            Some(ScriptedModel::answering("null")),
            Some(MemoryStore::new()),
            settings(),
        );

        let report = p.run_detail(LISTING).await;

        assert_eq!(report.links_visited, 10);
        assert_eq!(report.writes.attempted, 0);
        assert!(matches!(report.fallback, Some(WriteOutcome::Inserted)));

        let rows = p.store().unwrap().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, Category::Culture);
        assert_eq!(rows[0].source_url, LISTING);
        assert_eq!(rows[0].image_url, Category::Culture.default_image());
    }

    #[tokio::test]
    async fn test_detail_events_skip_fallback() {
        let model = ScriptedModel::answering("null")
            .when(
                "DETAIL-0",
                r#"```json
{"title": "Hamlet", "date": "2099-03-01", "venue": "Teatro Colón", "category": "culture"}
```"#,
            )
            .when(
                "DETAIL-1",
                r#"{"title": "Concierto pasado", "date": "2001-03-01", "category": "music"}"#,
            );
        let p = Pipeline::new(fetcher_with_links(3), Some(model), Some(MemoryStore::new()), settings());

        let report = p.run_detail(LISTING).await;

        assert_eq!(report.links_visited, 3);
        assert_eq!(report.writes.inserted, 1);
        assert_eq!(report.writes.expired, 1);
        assert!(report.fallback.is_none());

        let rows = p.store().unwrap().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Hamlet");
        assert_eq!(rows[0].source_url, "https://agenda.example/es/agenda/evento-0");
        assert_eq!(rows[0].address.as_deref(), Some("Teatro Colón"));
    }

    #[tokio::test]
    async fn test_unreachable_listing_still_writes_fallback() {
        let p = Pipeline::new(
            ScriptedFetcher::default(),
            Some(ScriptedModel::answering("null")),
            Some(MemoryStore::new()),
            settings(),
        );
        let report = p.run_detail(LISTING).await;
        assert_eq!(report.links_visited, 0);
        assert!(matches!(report.fallback, Some(WriteOutcome::Inserted)));
    }

    #[tokio::test]
    async fn test_fallback_not_duplicated_on_rerun() {
        let p = Pipeline::new(
            fetcher_with_links(2),
            Some(ScriptedModel::answering("null")),
            Some(MemoryStore::new()),
            settings(),
        );
        p.run_detail(LISTING).await;
        let second = p.run_detail(LISTING).await;
        assert!(matches!(second.fallback, Some(WriteOutcome::SkippedDuplicate)));
        assert_eq!(p.store().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_listings_visits_each_listing() {
        let p = Pipeline::new(
            fetcher_with_links(1),
            Some(ScriptedModel::answering("null")),
            Some(MemoryStore::new()),
            settings(),
        );
        let reports = p
            .run_listings(&[LISTING.to_string(), "https://otra.example/agenda".to_string()])
            .await;
        assert_eq!(reports.len(), 2);
        assert_eq!(p.store().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_model_fetches_nothing_but_still_writes_fallback() {
        let p: Pipeline<ScriptedFetcher, ScriptedModel, MemoryStore> =
            Pipeline::new(fetcher_with_links(3), None, Some(MemoryStore::new()), settings());

        let report = p.run_detail(LISTING).await;

        assert_eq!(report.links_visited, 0);
        assert!(p.fetcher_ref().requested.borrow().is_empty());
        assert!(matches!(report.fallback, Some(WriteOutcome::Inserted)));
        assert_eq!(p.store().unwrap().rows()[0].source_url, LISTING);
    }

    #[tokio::test]
    async fn test_fallback_outcome_is_the_gate_decision() {
        let p: Pipeline<ScriptedFetcher, ScriptedModel, MemoryStore> = Pipeline::new(
            fetcher_with_links(1),
            Some(ScriptedModel::answering("null")),
            None,
            settings(),
        );

        let report = p.run_detail(LISTING).await;

        assert!(matches!(report.fallback, Some(WriteOutcome::StoreUnavailable)));
        assert_eq!(report.writes, WriteTally::default());
    }
}
