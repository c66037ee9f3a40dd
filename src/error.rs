use std::io;
use thiserror::Error;

/// Boxed error used for failures coming from external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by caches, event providers and view lookups.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A list id was looked up that no event has ever mentioned (or the
    /// list was deleted).
    #[error("list not found: {0}")]
    ListNotFound(String),

    /// The event source failed to deliver the event log.
    #[error("event source failed: {0}")]
    Source(#[source] BoxError),

    /// The freshness oracle could not report a modification time.
    #[error("freshness oracle failed for dataset '{dataset_id}': {source}")]
    Oracle {
        dataset_id: String,
        #[source]
        source: BoxError,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap any error raised while fetching events.
    pub fn source_failed(err: impl Into<BoxError>) -> Self {
        Error::Source(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
