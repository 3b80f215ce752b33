//! Error taxonomy.
//!
//! `IngestError` and `ConfigError` are fatal: they halt a run before any
//! identification work happens. Empty training, empty pattern tables, and
//! empty candidate lists are non-fatal and are emitted as `tracing::warn!`
//! events plus counters rather than `Err` values — see `mining` and
//! `identify`.

use thiserror::Error;

/// Errors that abort ingestion of the input dataset.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("dataset file not found: {0}")]
    FileNotFound(String),

    #[error("dataset file is empty: {0}")]
    EmptyFile(String),

    #[error("malformed CSV row: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error reading dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
}

/// Errors from an out-of-range or contradictory `Config`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sliding_window_size must be >= 1, got {0}")]
    InvalidWindowSize(usize),

    #[error("min_support must be in (0, 1], got {0}")]
    InvalidMinSupport(f64),

    #[error("max_candidates_length must be >= 1, got {0}")]
    InvalidCandidateLength(usize),

    #[error("test_ratio must be in (0, 1), got {0}")]
    InvalidTestRatio(f64),

    #[error("pattern filter #{index} has length={length}, must be >= 1")]
    InvalidFilterLength { index: usize, length: usize },

    #[error("pattern filter #{index} has head={head}, must be >= 1")]
    InvalidFilterHead { index: usize, head: usize },

    #[error("context_attributes must not include reserved column {0:?}")]
    ReservedAttribute(String),
}
