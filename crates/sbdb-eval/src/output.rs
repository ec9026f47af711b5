use std::path::{Path, PathBuf};

use sbdb_core::write_table_csv;

use crate::errors::VerifyError;
use crate::model::Verification;
use crate::report::render_markdown;

/// Paths of the files written by [`write_artifacts`].
#[derive(Debug, Clone)]
pub struct VerificationArtifacts {
    pub result_path: PathBuf,
    pub report_csv_path: PathBuf,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

/// Write `result.csv`, `report.csv`, `verification.json` and `report.md`
/// into `out_dir`.
pub fn write_artifacts(
    verification: &Verification,
    out_dir: &Path,
    max_examples: usize,
) -> Result<VerificationArtifacts, VerifyError> {
    std::fs::create_dir_all(out_dir)?;

    let result_path = out_dir.join("result.csv");
    write_table_csv(&result_path, &verification.result_table()?)?;

    let report_csv_path = out_dir.join("report.csv");
    write_table_csv(&report_csv_path, &verification.report_table()?)?;

    let json_path = out_dir.join("verification.json");
    std::fs::write(&json_path, serde_json::to_vec_pretty(verification)?)?;

    let markdown_path = out_dir.join("report.md");
    std::fs::write(&markdown_path, render_markdown(verification, max_examples))?;

    Ok(VerificationArtifacts {
        result_path,
        report_csv_path,
        json_path,
        markdown_path,
    })
}
