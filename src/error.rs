use thiserror::Error;
use uuid::Uuid;

/// Failure to obtain a structured payload from a page.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("no embedded payload at {url}: {reason}")]
    Extraction { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Extraction { url, .. } => url,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run {0} not found")]
    RunNotFound(Uuid),

    #[error("run {0} was already finalized")]
    RunAlreadyFinalized(Uuid),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that abort an ingest run. Per-item failures never surface here.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("source '{name}' is not configured in the event store")]
    SourceNotConfigured { name: String },

    #[error("listing fetch failed")]
    ListingFetch(#[source] FetchError),

    #[error("run bookkeeping failed")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
