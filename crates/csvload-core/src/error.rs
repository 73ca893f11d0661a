//! Error types for csvload

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors raised while establishing the schema from the header row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Header row is empty")]
    EmptyHeader,

    #[error("Header column {index} is empty")]
    EmptyColumnName { index: usize },

    #[error("Duplicate header column: {name}")]
    DuplicateColumn { name: String },
}

/// Errors raised by a record source.
///
/// End-of-input is not an error; sources signal it with `Ok(None)`.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    Malformed(#[from] csv_async::Error),

    #[error("Input ended before a header row could be read")]
    MissingHeader,

    #[error("Invalid header: {0}")]
    InvalidHeader(#[from] SchemaError),
}

/// Outcome classification for a failed persist call.
///
/// The worker retry loop treats the two variants uniformly apart from
/// whether another attempt can succeed: `Retryable` failures are
/// re-attempted with backoff, `Fatal` failures are terminal for the row.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Retryable persistence failure: {0}")]
    Retryable(String),

    #[error("Fatal persistence failure: {0}")]
    Fatal(String),
}

impl PersistError {
    /// Whether the worker loop may re-attempt the same row
    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistError::Retryable(_))
    }
}

/// Top-level error for a pipeline run
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Record source error: {0}")]
    Source(#[from] SourceError),

    #[error("Row has {actual} fields but the schema has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All workers stopped before the input was exhausted")]
    WorkersStopped,

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
