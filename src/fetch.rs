//! Page fetching with a browser-like identity and a per-request timeout.
//!
//! Every outcome is classified into a [`FetchFailure`] so the orchestrators can
//! treat an unreachable source as "zero records" and move on. A 404 is logged
//! on its own because it usually means the source site changed its layout.

use crate::error::FetchFailure;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Anything that can turn a URL into page markup.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status();
        if let Some(failure) = classify_status(status) {
            if failure == FetchFailure::NotFound {
                warn!(%url, "Source returned 404; the site layout may have changed");
            }
            return Err(failure);
        }

        let body = response.text().await.map_err(classify_error)?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

fn classify_error(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if let Some(status) = err.status() {
        classify_status(status).unwrap_or(FetchFailure::HttpStatus(status.as_u16()))
    } else {
        FetchFailure::Network(err.to_string())
    }
}

/// `None` for success statuses.
pub fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    if status.is_success() {
        None
    } else if status == StatusCode::NOT_FOUND {
        Some(FetchFailure::NotFound)
    } else {
        Some(FetchFailure::HttpStatus(status.as_u16()))
    }
}
