use thiserror::Error;

/// Core error type shared across SBDB crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Table shape violates its invariants (duplicate columns, ragged rows).
    #[error("malformed table: {0}")]
    MalformedTable(String),
    /// A named column does not exist in the table.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by SBDB crates.
pub type Result<T> = std::result::Result<T, Error>;
