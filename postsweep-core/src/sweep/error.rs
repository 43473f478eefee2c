use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },
}

pub type SweepResult<T> = std::result::Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open journal at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("journal path not configured")]
    MissingPath,
    #[error("run {run_id} not found")]
    NotFound { run_id: String },
}

pub type JournalResult<T> = std::result::Result<T, JournalError>;
