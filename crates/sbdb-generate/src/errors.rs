use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a variable space. All are fatal: there is
/// nothing to enumerate.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("variable '{variable}' has an empty domain")]
    EmptyDomain { variable: String },
    #[error("malformed variable set: {0}")]
    MalformedInput(String),
    #[error("duplicate variable name: {0}")]
    DuplicateVariable(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("design space too large: combination count overflows")]
    TooManyCombinations,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while configuring an object batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("report attribute listed twice: {0}")]
    DuplicateAttribute(String),
    #[error("batch output does not come from the current combinations; re-run the batch first")]
    StaleOutput,
}

/// Failure of a single combination. Recorded by the batch, never propagated.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ItemError {
    #[error("construction failed: {message}")]
    Construction { message: String },
    #[error("constructor panicked: {message}")]
    Panicked { message: String },
    #[error("reportable attribute \"{attribute}\" is not available on the instance")]
    AttributeProjection { attribute: String },
}

impl ItemError {
    /// Short stage label used in reports and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::Construction { .. } => "construction",
            ItemError::Panicked { .. } => "panicked",
            ItemError::AttributeProjection { .. } => "attribute_projection",
        }
    }
}
