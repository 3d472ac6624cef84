//! # Agenda Colombia
//!
//! Collects upcoming cultural events for Colombian cities. Public event
//! listing pages are fetched, reduced to their visible text, and handed to a
//! Gemini model that returns structured records. Records are normalized,
//! screened for duplicates and expiry, and written to a Supabase `events`
//! table.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... SUPABASE_URL=... SUPABASE_KEY=... agenda_colombia
//! agenda_colombia --detail-url https://www.idartes.gov.co/es/agenda --dry-run
//! ```
//!
//! ## Architecture
//!
//! 1. **Catalog**: per-city primary and secondary listing URLs plus a national fallback
//! 2. **Fetching**: download a listing and reduce it to plain text
//! 3. **Extraction**: prompt the model, recover JSON from the reply
//! 4. **Normalization**: canonical records with defaults filled in
//! 5. **Gate**: skip duplicates and past events, insert the rest
//!
//! Cities are processed one at a time; a second flow visits the deep links on
//! a listing page and extracts one event per page.

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod catalog;
mod cli;
mod config;
mod detail;
mod error;
mod extract;
mod fetch;
mod gate;
mod models;
mod normalize;
mod orchestrator;
mod parse;
mod prompt;
mod store;
mod text;
mod utils;

use api::{GeminiClient, RetryAsk};
use catalog::SourceCatalog;
use cli::Cli;
use config::{RunSettings, resolve_catalog};
use extract::Pipeline;
use fetch::HttpFetcher;
use gate::WriteOutcome;
use store::{EventStore, MemoryStore, SupabaseStore};

const MODEL_MAX_RETRIES: usize = 3;
const MODEL_BASE_DELAY: Duration = Duration::from_secs(1);
const MODEL_TIMEOUT: Duration = Duration::from_secs(60);

type Model = RetryAsk<GeminiClient>;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("agenda_colombia starting up");

    let args = Cli::parse();
    debug!(catalog = ?args.catalog, detail = args.detail_mode(), dry_run = args.dry_run, "Parsed CLI arguments");

    let catalog = resolve_catalog(args.catalog.as_deref());
    let settings = RunSettings::from_cli(&args);
    let fetcher = HttpFetcher::new(Duration::from_secs(args.fetch_timeout_secs))?;
    let model = build_model(&args)?;

    if args.dry_run {
        info!("Dry run: events are kept in memory only");
        let pipeline = Pipeline::new(fetcher, model, Some(MemoryStore::new()), settings);
        run_pass(&pipeline, &catalog, &args).await;
        if let Some(store) = pipeline.store() {
            if store.is_empty() {
                warn!("Dry run extracted no events");
            }
            for row in store.rows() {
                info!(title = %row.title, date = %row.date, category = %row.category, city = ?row.city, "Extracted");
            }
            info!(count = store.len(), "Dry run complete");
        }
    } else {
        let store = build_store(&args)?;
        let pipeline = Pipeline::new(fetcher, model, store, settings);
        run_pass(&pipeline, &catalog, &args).await;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn build_model(args: &Cli) -> Result<Option<Model>, reqwest::Error> {
    let Some(key) = args.gemini_api_key.clone().filter(|k| !k.trim().is_empty()) else {
        error!("GEMINI_API_KEY not set; no events will be extracted");
        return Ok(None);
    };
    let client = GeminiClient::new(key, args.model.clone(), MODEL_TIMEOUT)?;
    info!(model = %args.model, "Gemini client ready");
    Ok(Some(RetryAsk::new(client, MODEL_MAX_RETRIES, MODEL_BASE_DELAY)))
}

fn build_store(args: &Cli) -> Result<Option<SupabaseStore>, reqwest::Error> {
    match (args.supabase_url.as_deref(), args.supabase_key.clone()) {
        (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
            let store = SupabaseStore::new(url, key, Duration::from_secs(args.fetch_timeout_secs))?;
            info!(url, "Supabase store ready");
            Ok(Some(store))
        }
        _ => {
            error!("SUPABASE_URL or SUPABASE_KEY not set; events will not be stored");
            Ok(None)
        }
    }
}

/// Run whichever flow the arguments select.
async fn run_pass<S: EventStore>(pipeline: &Pipeline<HttpFetcher, Model, S>, catalog: &SourceCatalog, args: &Cli) {
    if !args.detail_mode() {
        let summary = pipeline.run_catalog(catalog).await;
        let empty: Vec<&str> = summary.cities_without_events().collect();
        if !empty.is_empty() {
            warn!(cities = ?empty, "Cities finished without events");
        }
        return;
    }

    let listings = match &args.detail_url {
        Some(url) => vec![url.clone()],
        None => catalog.listings().to_vec(),
    };
    if listings.is_empty() {
        warn!("Detail mode requested but no listing pages are configured");
        return;
    }

    for report in pipeline.run_listings(&listings).await {
        if let Some(WriteOutcome::Failed(e)) = &report.fallback {
            error!(listing = %report.listing_url, error = %e, "Fallback record could not be stored");
        }
        info!(
            listing = %report.listing_url,
            links = report.links_visited,
            inserted = report.writes.inserted,
            fallback = ?report.fallback.as_ref().map(|o| o.is_inserted()),
            "Detail flow finished"
        );
    }
}
