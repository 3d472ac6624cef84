//! Command-line interface definitions.
//!
//! Running with no arguments performs one full pass over the built-in source
//! catalog. Credentials come from the environment; every other option has a
//! default and can also be supplied through the environment.

use crate::api::DEFAULT_MODEL;
use clap::Parser;

/// One extraction pass over Colombian event listings.
///
/// # Examples
///
/// ```sh
/// # Full pass over every city in the built-in catalog
/// agenda_colombia
///
/// # Detail-page flow for a single listing, without touching Supabase
/// agenda_colombia --detail-url https://www.idartes.gov.co/es/agenda --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML file replacing the built-in source catalog
    #[arg(long, env = "AGENDA_CATALOG")]
    pub catalog: Option<String>,

    /// Run the detail-page flow over the catalog's listing pages instead of the city pass
    #[arg(long)]
    pub detail: bool,

    /// Run the detail-page flow for this listing page only
    #[arg(long, env = "AGENDA_DETAIL_URL")]
    pub detail_url: Option<String>,

    /// Keep extracted events in memory instead of writing them to Supabase
    #[arg(long)]
    pub dry_run: bool,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Per-request timeout for page fetches, in seconds
    #[arg(long, env = "AGENDA_FETCH_TIMEOUT_SECS", default_value_t = 20)]
    pub fetch_timeout_secs: u64,

    /// Pause between detail-page fetches, in milliseconds
    #[arg(long, env = "AGENDA_DETAIL_DELAY_MS", default_value_t = 1500)]
    pub detail_delay_ms: u64,

    /// Character budget for page text sent to the model
    #[arg(long, env = "AGENDA_MAX_TEXT_CHARS", default_value_t = crate::text::MAX_TEXT_CHARS)]
    pub max_text_chars: usize,
}

impl Cli {
    pub fn detail_mode(&self) -> bool {
        self.detail || self.detail_url.is_some()
    }
}
