//! Per-city source fallback.
//!
//! Each city walks a small state machine:
//!
//! ```text
//! TryPrimary ──found < 3 and secondary──▶ TrySecondary ──found == 0──▶ TryNational ──▶ Done
//!     │                                        │                                    ▲
//!     ├──found == 0, no secondary──────────────┼────────────▶ TryNational           │
//!     └──otherwise─────────────────────────────┴──otherwise─────────────────────────┘
//! ```
//!
//! `events_found` counts every normalized record handed to the gate, whether
//! the gate then wrote it or skipped it as a duplicate. An unreachable source
//! contributes zero and the city moves on to its next stage.

use crate::api::AskAsync;
use crate::catalog::{SourceCatalog, SourceEntry};
use crate::error::FetchFailure;
use crate::extract::{Pipeline, SourceOutcome, WriteTally};
use crate::fetch::PageFetcher;
use crate::gate::ExpiryCheck;
use crate::normalize::SourceContext;
use crate::prompt::{ListingRequest, build_listing_prompt};
use crate::store::EventStore;
use std::fmt;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityStage {
    TryPrimary,
    TrySecondary,
    TryNational,
    Done,
}

impl fmt::Display for CityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CityStage::TryPrimary => "primary",
            CityStage::TrySecondary => "secondary",
            CityStage::TryNational => "national",
            CityStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// The stage after `current`, given the running tally.
pub fn next_stage(current: CityStage, found: usize, has_secondary: bool, threshold: usize) -> CityStage {
    match current {
        CityStage::TryPrimary if found < threshold && has_secondary => CityStage::TrySecondary,
        CityStage::TryPrimary | CityStage::TrySecondary if found == 0 => CityStage::TryNational,
        _ => CityStage::Done,
    }
}

/// What one city produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityTally {
    pub city: String,
    pub events_found: usize,
    /// Stages that actually ran, in order.
    pub stages: Vec<CityStage>,
    pub writes: WriteTally,
}

/// Totals for a full pass over the catalog.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cities: Vec<CityTally>,
    pub writes: WriteTally,
}

impl RunSummary {
    pub fn events_found(&self) -> usize {
        self.cities.iter().map(|c| c.events_found).sum()
    }

    pub fn cities_without_events(&self) -> impl Iterator<Item = &str> {
        self.cities
            .iter()
            .filter(|c| c.events_found == 0)
            .map(|c| c.city.as_str())
    }
}

/// The national page's reduced text, fetched at most once per run.
#[derive(Debug, Default)]
pub struct NationalPage {
    text: Option<Result<String, FetchFailure>>,
}

impl<F, C, S> Pipeline<F, C, S>
where
    F: PageFetcher,
    C: AskAsync<Response = String>,
    S: EventStore,
{
    /// One full pass over every city in `catalog`, sequentially.
    ///
    /// The national page is fetched at most once, however many cities fall
    /// back to it.
    ///
    /// # Returns
    ///
    /// A [`RunSummary`] with one [`CityTally`] per city, in catalog order, and
    /// the combined gate decisions.
    #[instrument(level = "info", skip_all, fields(cities = catalog.city_count()))]
    pub async fn run_catalog(&self, catalog: &SourceCatalog) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut national = NationalPage::default();

        for (city, entry) in catalog.cities() {
            let tally = self.run_city(city, entry, catalog.national(), &mut national).await;
            summary.writes.absorb(&tally.writes);
            summary.cities.push(tally);
        }

        info!(
            cities = summary.cities.len(),
            events_found = summary.events_found(),
            inserted = summary.writes.inserted,
            duplicates = summary.writes.duplicates,
            failed = summary.writes.failed,
            "Catalog pass complete"
        );
        summary
    }

    /// Walk one city's state machine to `Done`.
    #[instrument(level = "info", skip(self, entry, national_url, national))]
    pub async fn run_city(
        &self,
        city: &str,
        entry: &SourceEntry,
        national_url: &str,
        national: &mut NationalPage,
    ) -> CityTally {
        let threshold = self.settings().secondary_threshold;
        let has_secondary = entry.secondary.is_some();
        let mut tally = CityTally {
            city: city.to_string(),
            events_found: 0,
            stages: Vec::new(),
            writes: WriteTally::default(),
        };

        let mut stage = CityStage::TryPrimary;
        while stage != CityStage::Done {
            let outcome = match stage {
                CityStage::Done => break,
                _ if !self.has_model() => SourceOutcome::NoModel,
                CityStage::TryPrimary => self.extract_listing(city, &entry.primary, None, false).await,
                CityStage::TrySecondary => match entry.secondary.as_deref() {
                    Some(url) => self.extract_listing(city, url, None, false).await,
                    None => SourceOutcome::Extracted(WriteTally::default()),
                },
                CityStage::TryNational => {
                    let text = self.national_text(national_url, national).await;
                    self.extract_listing(city, national_url, Some(text), true).await
                }
            };

            tally.events_found += outcome.attempted();
            if let SourceOutcome::Extracted(writes) = &outcome {
                tally.writes.absorb(writes);
            }
            info!(%city, %stage, found = tally.events_found, outcome = outcome_label(&outcome), "Stage finished");

            tally.stages.push(stage);
            stage = next_stage(stage, tally.events_found, has_secondary, threshold);
        }

        info!(%city, events_found = tally.events_found, inserted = tally.writes.inserted, "City done");
        tally
    }

    async fn national_text(&self, url: &str, national: &mut NationalPage) -> Result<String, FetchFailure> {
        if let Some(text) = &national.text {
            return text.clone();
        }
        let text = self.fetch_text(url, self.settings().max_text_chars).await;
        national.text = Some(text.clone());
        text
    }

    /// Fetch (unless `prefetched`), extract and write one listing page.
    async fn extract_listing(
        &self,
        city: &str,
        url: &str,
        prefetched: Option<Result<String, FetchFailure>>,
        filter_to_city: bool,
    ) -> SourceOutcome {
        let text = match prefetched {
            Some(text) => text,
            None => self.fetch_text(url, self.settings().max_text_chars).await,
        };
        let text = match text {
            Ok(text) => text,
            Err(failure) => return SourceOutcome::Unreachable(failure),
        };
        if text.is_empty() {
            warn!(%url, "Source page has no visible text");
        }

        let prompt = build_listing_prompt(&ListingRequest {
            text: &text,
            source_url: url,
            city,
            filter_to_city,
        });
        let Some(reply) = self.complete(&prompt).await else {
            return SourceOutcome::ExtractionFailed;
        };
        let Some(candidates) = self.candidates_from(&reply) else {
            return SourceOutcome::ExtractionFailed;
        };
        info!(%city, %url, count = candidates.len(), "Found events");

        let ctx = SourceContext {
            page_url: url,
            city: Some(city),
        };
        SourceOutcome::Extracted(self.write_all(candidates, &ctx, ExpiryCheck::Skip).await)
    }
}

fn outcome_label(outcome: &SourceOutcome) -> &'static str {
    match outcome {
        SourceOutcome::Unreachable(FetchFailure::NotFound) => "not_found",
        SourceOutcome::Unreachable(_) => "unreachable",
        SourceOutcome::NoModel => "no_model",
        SourceOutcome::ExtractionFailed => "extraction_failed",
        SourceOutcome::Extracted(_) => "extracted",
    }
}
