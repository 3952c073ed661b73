//! Error type shared by the fetch, storage, and conversion stages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort work on a single target (or startup, for `Config`).
///
/// A non-200 export response is deliberately absent here: the fetcher
/// reports it as [`crate::fetcher::FetchOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("archive {} is unreadable: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("entry '{entry}' is not valid CSV: {source}")]
    Csv {
        entry: String,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
