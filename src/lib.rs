//! Menu-Atlas: a resumable store-directory and catalog crawler
//!
//! This crate walks a location directory (region → sub-region → store), then
//! fetches every store's catalog (category → item → customization) and unions
//! the prices into one growing table. Every unit of work is checkpointed on
//! disk, so an interrupted run picks up where it stopped.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod fetch;
pub mod model;
pub mod output;
pub mod parse;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Menu-Atlas operations
///
/// Everything here is fatal for the command being run. Per-item problems are
/// reported as [`ItemError`] and never abort a stage.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read directory root {url}: {source}")]
    Bootstrap { url: String, source: ItemError },

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] storage::LedgerError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Why a page could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transient failure for {url}: {message}")]
    Transient { url: String, message: String },

    #[error("Blocked from {url}: {reason}")]
    Blocked { url: String, reason: String },
}

/// A fetched page did not have the structure the parser expects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Missing {what} in {page}")]
    MissingStructure { page: String, what: String },

    #[error("Malformed page data in {page}: {message}")]
    Malformed { page: String, message: String },
}

/// A durable write did not complete
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error for {path}: {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Refusing to overwrite {path}: merged table is missing {missing}")]
    Shrink { path: PathBuf, missing: String },
}

/// Failure of a single unit of work inside a stage
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("Cancelled before completion")]
    Cancelled,
}

impl ItemError {
    /// Short label used in progress output and the run ledger
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::NotFound { .. }) => "not_found",
            Self::Fetch(FetchError::Timeout { .. }) => "timeout",
            Self::Fetch(FetchError::Transient { .. }) => "transient",
            Self::Fetch(FetchError::Blocked { .. }) => "blocked",
            Self::Parse(_) => "parse",
            Self::Persist(_) => "persist",
            Self::Panicked(_) => "panic",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result type alias for Menu-Atlas operations
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checkpoint::{CheckpointStore, CheckpointStoreExt, FsCheckpointStore, Stage, StageKey};
pub use config::Config;
pub use model::{Category, Coordinates, Customization, MenuItem, Region, Store, SubRegion};
pub use state::ItemState;
