//! Error taxonomy for the extraction pipeline.
//!
//! Every failure the pipeline can recover from has its own type so that the
//! orchestrators branch on variants rather than on log output:
//!
//! | Type | Raised by | Recovery |
//! |------|-----------|----------|
//! | [`FetchFailure`] | [`crate::fetch`] | source treated as empty |
//! | [`CompletionError`] | [`crate::api`] | zero candidates for that call |
//! | [`ParseError`] | [`crate::parse`] | zero candidates for that call |
//! | [`NormalizeError`] | [`crate::normalize`] | candidate dropped |
//! | [`StoreError`] | [`crate::store`] | record skipped, siblings continue |
//! | [`ConfigError`] | [`crate::config`] | built-in catalog used instead |

use thiserror::Error;

/// Why a page could not be fetched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,
    /// A 404 usually means the source site changed its URL layout.
    #[error("page not found (404)")]
    NotFound,
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
}

/// The language model could not produce a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response missing text content")]
    EmptyResponse,
}

/// The model reply could not be turned into candidate records.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The reply was cut off mid-document (usually a token limit).
    #[error("model reply is truncated JSON: {0}")]
    Truncated(#[source] serde_json::Error),
    #[error("model reply is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("model reply has unexpected shape: expected {expected}")]
    Shape { expected: &'static str },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("candidate has no title")]
    MissingTitle,
}

/// Failure talking to the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    /// The store enforces a uniqueness constraint the gate did not see coming.
    #[error("store reports a conflicting row for {title:?}")]
    Conflict { title: String },
    #[error("store returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("catalog {path} defines no cities")]
    Empty { path: String },
    #[error("catalog {path} has an invalid URL {url:?}: {source}")]
    InvalidUrl {
        path: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
}
