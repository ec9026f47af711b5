use thiserror::Error;

/// Errors emitted by the verification engine.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("key column '{column}' not found in {table} table")]
    MissingKeyColumn { table: String, column: String },
    #[error("duplicate key '{key}' in {table} table (rows {first_row} and {second_row})")]
    DuplicateKey {
        table: String,
        key: String,
        first_row: usize,
        second_row: usize,
    },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Table(#[from] sbdb_core::Error),
}
