//! Crate-wide error taxonomy.
//!
//! Mirrors the shape of the teacher's job-system error enum: one
//! `thiserror`-derived type with `From` conversions for the lower-level
//! errors this crate actually produces (sqlite, filesystem, watcher).

use thiserror::Error;

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overlap detected with existing watched root: {overlapping_folder}")]
    OverlapDetected { overlapping_folder: String },

    #[error("store error: {0}")]
    StoreError(String),

    #[error("io error: {0}")]
    IoError(String),

    #[error("watcher error: {0}")]
    WatcherError(String),
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::StoreError(err.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::IoError(err.to_string())
    }
}

impl From<notify::Error> for IndexError {
    fn from(err: notify::Error) -> Self {
        IndexError::WatcherError(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::InvalidInput(err.to_string())
    }
}

impl From<toml::de::Error> for IndexError {
    fn from(err: toml::de::Error) -> Self {
        IndexError::StoreError(format!("config parse error: {err}"))
    }
}

impl From<toml::ser::Error> for IndexError {
    fn from(err: toml::ser::Error) -> Self {
        IndexError::StoreError(format!("config serialize error: {err}"))
    }
}

impl From<tokio::task::JoinError> for IndexError {
    fn from(err: tokio::task::JoinError) -> Self {
        IndexError::StoreError(format!("blocking task panicked: {err}"))
    }
}
