use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ItemId, Status};

pub type Result<T> = std::result::Result<T, StaleError>;

/// Failures while enumerating or reading workspace files.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("skipping {path}: {size} bytes exceeds the size ceiling")]
    Oversized { path: PathBuf, size: u64 },

    #[error("skipping {path}: not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },

    #[error("workspace root {root} is not accessible: {reason}")]
    RootUnavailable { root: PathBuf, reason: String },

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeuristicError {
    #[error("heuristic '{heuristic}' failed: {reason}")]
    Failed { heuristic: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache snapshot {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("cache snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified failure reported by a [`crate::regeneration::Generator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("generator rejected the credentials")]
    Auth,

    #[error("generator rate limit reached")]
    RateLimit,

    #[error("generator reported a transient server error")]
    TransientServer,

    #[error("generator failed: {0}")]
    Other(String),
}

/// Operations attempted against an item in the wrong lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidState {
    #[error("no stale comment with id {0}")]
    UnknownItem(ItemId),

    #[error("item {0} has no regenerated text to apply")]
    MissingRegeneratedText(ItemId),

    #[error("item {id} is {actual:?}, expected {expected:?}")]
    StatusConflict {
        id: ItemId,
        expected: Status,
        actual: Status,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegenerationError {
    #[error("regeneration failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    InvalidState(#[from] InvalidState),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key-value store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key-value store contents are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("failed to edit {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("range {range} is outside of {path}")]
    OutOfBounds { path: PathBuf, range: String },

    #[error("{path} changed at {range} since it was scanned")]
    Conflict { path: PathBuf, range: String },
}

#[derive(Error, Debug)]
pub enum StaleError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Regeneration(#[from] RegenerationError),

    #[error(transparent)]
    InvalidState(#[from] InvalidState),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for StaleError {
    fn from(err: config::ConfigError) -> Self {
        StaleError::Config(err.to_string())
    }
}
