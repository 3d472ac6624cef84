//! Run configuration: source catalog loading and pipeline tunables.

use crate::catalog::SourceCatalog;
use crate::cli::Cli;
use crate::error::ConfigError;
use std::time::Duration;
use tracing::{error, info, instrument};
use url::Url;

/// How many events a primary source must yield for the secondary to be skipped.
pub const SECONDARY_THRESHOLD: usize = 3;
/// Most deep links visited per listing in the detail-page flow.
pub const DETAIL_LINK_CAP: usize = 10;
/// Path segment that marks an event deep link.
pub const AGENDA_SEGMENT: &str = "/agenda/";
const DETAIL_TEXT_CHARS: usize = 15_000;

/// Tunables shared by both orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub max_text_chars: usize,
    pub detail_text_chars: usize,
    pub detail_delay: Duration,
    pub detail_link_cap: usize,
    pub agenda_segment: String,
    pub secondary_threshold: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_text_chars: crate::text::MAX_TEXT_CHARS,
            detail_text_chars: DETAIL_TEXT_CHARS,
            detail_delay: Duration::from_millis(1500),
            detail_link_cap: DETAIL_LINK_CAP,
            agenda_segment: AGENDA_SEGMENT.to_string(),
            secondary_threshold: SECONDARY_THRESHOLD,
        }
    }
}

impl RunSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            max_text_chars: cli.max_text_chars,
            detail_text_chars: DETAIL_TEXT_CHARS.min(cli.max_text_chars),
            detail_delay: Duration::from_millis(cli.detail_delay_ms),
            ..Self::default()
        }
    }
}

/// Read and validate a YAML catalog.
#[instrument(level = "info")]
pub fn load_catalog_file(path: &str) -> Result<SourceCatalog, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let catalog: SourceCatalog = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Invalid {
        path: path.to_string(),
        source,
    })?;
    validate_catalog(&catalog, path)?;
    Ok(catalog)
}

fn validate_catalog(catalog: &SourceCatalog, path: &str) -> Result<(), ConfigError> {
    if catalog.city_count() == 0 {
        return Err(ConfigError::Empty {
            path: path.to_string(),
        });
    }
    for url in catalog.urls() {
        Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            path: path.to_string(),
            url: url.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// The catalog for this run: the file if one was given and it is valid,
/// otherwise the built-in Colombian catalog.
pub fn resolve_catalog(path: Option<&str>) -> SourceCatalog {
    match path {
        Some(path) => match load_catalog_file(path) {
            Ok(catalog) => {
                info!(path, cities = catalog.city_count(), "Loaded source catalog");
                catalog
            }
            Err(e) => {
                error!(error = %e, "Falling back to the built-in catalog");
                SourceCatalog::colombia()
            }
        },
        None => SourceCatalog::colombia(),
    }
}
