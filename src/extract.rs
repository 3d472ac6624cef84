//! The shared extraction steps: fetch, reduce, ask, parse, normalize, write.
//!
//! [`Pipeline`] owns the collaborators for one run. The city orchestrator
//! ([`crate::orchestrator`]) and the detail-page flow ([`crate::detail`]) are
//! both built from the steps here, so a record is normalized and screened the
//! same way whichever source produced it.
//!
//! A missing model or store is represented by `None`. The corresponding steps
//! become no-ops; `main` logs the missing credential once at startup.

use crate::api::AskAsync;
use crate::config::RunSettings;
use crate::error::FetchFailure;
use crate::fetch::PageFetcher;
use crate::gate::{self, ExpiryCheck, WriteOutcome};
use crate::models::{CanonicalEvent, RawEvent};
use crate::normalize::{SourceContext, normalize};
use crate::parse::{parse_candidates, parse_single};
use crate::store::EventStore;
use crate::text::reduce;
use crate::utils::{now_utc, today, truncate_for_log};
use tracing::{debug, error, instrument, warn};

/// Result of reading one source.
#[derive(Debug)]
pub enum SourceOutcome {
    /// The page could not be fetched.
    Unreachable(FetchFailure),
    /// No model is configured for this run.
    NoModel,
    /// The model call failed or its reply could not be parsed.
    ExtractionFailed,
    /// Candidates were extracted and submitted to the gate.
    Extracted(WriteTally),
}

impl SourceOutcome {
    /// Records handed to the gate, whatever the gate decided.
    pub fn attempted(&self) -> usize {
        match self {
            SourceOutcome::Extracted(tally) => tally.attempted,
            _ => 0,
        }
    }
}

/// Counts of gate decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteTally {
    pub attempted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub expired: usize,
    pub failed: usize,
    pub unavailable: usize,
    /// Candidates dropped before the gate (no title).
    pub rejected: usize,
}

impl WriteTally {
    pub fn record(&mut self, outcome: &WriteOutcome) {
        self.attempted += 1;
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::SkippedDuplicate => self.duplicates += 1,
            WriteOutcome::SkippedExpired => self.expired += 1,
            WriteOutcome::StoreUnavailable => self.unavailable += 1,
            WriteOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn absorb(&mut self, other: &WriteTally) {
        self.attempted += other.attempted;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.expired += other.expired;
        self.failed += other.failed;
        self.unavailable += other.unavailable;
        self.rejected += other.rejected;
    }
}

pub struct Pipeline<F, C, S> {
    fetcher: F,
    model: Option<C>,
    store: Option<S>,
    settings: RunSettings,
}

impl<F, C, S> Pipeline<F, C, S>
where
    F: PageFetcher,
    C: AskAsync<Response = String>,
    S: EventStore,
{
    pub fn new(fetcher: F, model: Option<C>, store: Option<S>, settings: RunSettings) -> Self {
        Self {
            fetcher,
            model,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    #[cfg(test)]
    pub(crate) fn fetcher_ref(&self) -> &F {
        &self.fetcher
    }

    #[cfg(test)]
    pub(crate) fn model_ref(&self) -> Option<&C> {
        self.model.as_ref()
    }

    /// Raw markup of `url`, with the failure logged.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn fetch_markup(&self, url: &str) -> Result<String, FetchFailure> {
        self.fetcher.fetch(url).await.inspect_err(|e| {
            warn!(%url, error = %e, "Failed to fetch source; treating it as empty");
        })
    }

    /// Visible text of `url`, cut to `max_chars`.
    pub(crate) async fn fetch_text(&self, url: &str, max_chars: usize) -> Result<String, FetchFailure> {
        let html = self.fetch_markup(url).await?;
        let text = reduce(&html, max_chars);
        debug!(%url, chars = text.chars().count(), "Reduced page text");
        Ok(text)
    }

    /// The model's reply to `prompt`, or `None` when no model is configured
    /// or the call failed.
    pub(crate) async fn complete(&self, prompt: &str) -> Option<String> {
        let model = self.model.as_ref()?;
        match model.ask(prompt).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(error = %e, "Model call failed; no events extracted");
                None
            }
        }
    }

    /// Candidates from a listing reply; parse failures resolve to none.
    pub(crate) fn candidates_from(&self, reply: &str) -> Option<Vec<RawEvent>> {
        match parse_candidates(reply) {
            Ok(candidates) => Some(candidates),
            Err(e) => {
                warn!(error = %e, reply = %truncate_for_log(reply, 300), "Error parsing model reply");
                None
            }
        }
    }

    /// The single candidate of a detail reply; `None` for "not an event" and
    /// for unparseable replies.
    pub(crate) fn single_from(&self, reply: &str) -> Option<RawEvent> {
        match parse_single(reply) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, reply = %truncate_for_log(reply, 300), "Error parsing model reply");
                None
            }
        }
    }

    /// Normalize and submit one candidate. `None` when it had no title.
    pub(crate) async fn write_candidate(
        &self,
        raw: RawEvent,
        ctx: &SourceContext<'_>,
        expiry: ExpiryCheck,
    ) -> Option<WriteOutcome> {
        match normalize(raw, ctx) {
            Ok(event) => Some(self.write_event(&event, expiry).await),
            Err(e) => {
                warn!(page = %ctx.page_url, error = %e, "Dropping candidate");
                None
            }
        }
    }

    pub(crate) async fn write_event(&self, event: &CanonicalEvent, expiry: ExpiryCheck) -> WriteOutcome {
        gate::submit(self.store.as_ref(), event, expiry, now_utc(), today()).await
    }

    /// Submit every candidate, counting what the gate decided.
    pub(crate) async fn write_all(
        &self,
        candidates: Vec<RawEvent>,
        ctx: &SourceContext<'_>,
        expiry: ExpiryCheck,
    ) -> WriteTally {
        let mut tally = WriteTally::default();
        for raw in candidates {
            match self.write_candidate(raw, ctx, expiry).await {
                Some(outcome) => tally.record(&outcome),
                None => tally.rejected += 1,
            }
        }
        tally
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators shared by the orchestrator tests.

    use super::*;
    use crate::error::CompletionError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves fixed pages; unknown URLs are 404s.
    #[derive(Debug, Default)]
    pub struct ScriptedFetcher {
        pages: HashMap<String, String>,
        pub requested: RefCell<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        pub fn requests_for(&self, url: &str) -> usize {
            self.requested.borrow().iter().filter(|u| *u == url).count()
        }
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchFailure::NotFound)
        }
    }

    /// Replies by looking for a marker in the prompt; falls back to `default`.
    #[derive(Debug, Default)]
    pub struct ScriptedModel {
        replies: Vec<(String, String)>,
        default: String,
        pub prompts: RefCell<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn answering(default: &str) -> Self {
            Self {
                default: default.to_string(),
                ..Self::default()
            }
        }

        pub fn when(mut self, marker: &str, reply: &str) -> Self {
            self.replies.push((marker.to_string(), reply.to_string()));
            self
        }
    }

    impl AskAsync for ScriptedModel {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, CompletionError> {
            self.prompts.borrow_mut().push(text.to_string());
            let reply = self
                .replies
                .iter()
                .find(|(marker, _)| text.contains(marker.as_str()))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| self.default.clone());
            Ok(reply)
        }
    }

    /// A JSON array of `n` distinct future events.
    pub fn events_reply(prefix: &str, n: usize) -> String {
        let items: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"title": "{prefix} {i}", "date": "2099-01-0{}", "category": "music"}}"#, i + 1))
            .collect();
        format!("```json\n[{}]\n```", items.join(","))
    }

    pub fn page(body: &str) -> String {
        format!("<html><body><p>{body}</p></body></html>")
    }
}
