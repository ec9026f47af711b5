//! Verification of generated object tables against reference libraries.

pub mod engine;
pub mod errors;
pub mod model;
pub mod output;
pub mod report;

pub use engine::VerificationEngine;
pub use errors::VerifyError;
pub use model::{
    CellOutcome, ColumnReport, ResultRow, RowStatus, TextCell, TextColumnSummary, Verification,
    VerificationSummary, VerifyOptions,
};
pub use output::{VerificationArtifacts, write_artifacts};
pub use report::render_markdown;
