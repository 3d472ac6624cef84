//! Persistence for extracted events.
//!
//! - [`EventStore`]: the two operations the pipeline needs
//! - [`SupabaseStore`]: the `events` table behind Supabase's PostgREST API
//! - [`MemoryStore`]: an in-process table used by `--dry-run` and tests
//!
//! Neither store makes "look up title, then insert" atomic; that sequence is
//! driven by [`crate::gate`]. A unique index on `events.title` closes the race
//! between overlapping runs; [`SupabaseStore`] reports its violation (HTTP 409)
//! as [`StoreError::Conflict`].

use crate::error::StoreError;
use crate::models::EventRow;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

pub const EVENTS_TABLE: &str = "events";

/// A row already present in the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExistingEvent {
    #[serde(default)]
    pub id: Option<Value>,
    pub title: String,
}

pub trait EventStore {
    /// Exact, case-sensitive title lookup.
    async fn find_by_title(&self, title: &str) -> Result<Option<ExistingEvent>, StoreError>;
    async fn insert(&self, row: &EventRow) -> Result<(), StoreError>;
}

pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SupabaseStore {
    /// Create a client for the `events` table of a Supabase project.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL such as `https://abc.supabase.co`; a trailing slash is ignored
    /// * `api_key` - Service key, sent both as `apikey` and as the bearer token
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{EVENTS_TABLE}", self.base_url)
    }
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// PostgREST exact-match filter for `title`.
///
/// A top-level `eq.` filter takes the rest of the value literally, so the title
/// is only percent-encoded for the query string, never quoted.
pub fn title_filter(title: &str) -> String {
    format!("eq.{}", urlencoding::encode(title))
}

impl EventStore for SupabaseStore {
    #[instrument(level = "debug", skip_all, fields(%title))]
    async fn find_by_title(&self, title: &str) -> Result<Option<ExistingEvent>, StoreError> {
        let url = format!(
            "{}?select=id,title&title={}&limit=1",
            self.endpoint(),
            title_filter(title)
        );
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<ExistingEvent> = serde_json::from_str(&body)?;
        debug!(matches = rows.len(), "Title lookup finished");
        Ok(rows.into_iter().next())
    }

    #[instrument(level = "debug", skip_all, fields(title = %row.title))]
    async fn insert(&self, row: &EventRow) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict {
                title: row.title.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// In-process events table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<EventRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_rows(rows: Vec<EventRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<EventRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<ExistingEvent>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Rejected {
            status: 500,
            body: "memory store poisoned".to_string(),
        })?;
        Ok(rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.title == title)
            .map(|(idx, row)| ExistingEvent {
                id: Some(Value::from(idx + 1)),
                title: row.title.clone(),
            }))
    }

    async fn insert(&self, row: &EventRow) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Rejected {
            status: 500,
            body: "memory store poisoned".to_string(),
        })?;
        rows.push(row.clone());
        Ok(())
    }
}
