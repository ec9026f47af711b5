use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by sinks, collection files and the dataset tracker.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),
    #[error("unknown operation '{0}' (expected generation, dataset_verification, database_population or database_verification)")]
    UnknownOperation(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Table(#[from] sbdb_core::Error),
}
