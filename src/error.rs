//! Error types for experiment-insights
//!
//! Missing data is not an error here: aggregate computations return `None`
//! when there is nothing to summarize. These variants cover invalid records,
//! unknown experiments and snapshot I/O.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// experiment-insights error types
#[derive(Error, Debug)]
pub enum Error {
    /// A record or argument failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lookup of an experiment (or other keyed entity) failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage error (Parquet/Arrow snapshot)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration could not be loaded or is out of range
    #[error("Configuration error: {0}\nCheck the dashboard config file against the documented defaults")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
