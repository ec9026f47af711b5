use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::VerifyError;

/// Options for table verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    /// Relative error above which a cell is flagged.
    pub tolerance: f64,
    /// Per-column overrides of `tolerance`.
    pub column_tolerances: BTreeMap<String, f64>,
    /// Limit the number of examples emitted in the report.
    pub max_examples: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            column_tolerances: BTreeMap::new(),
            max_examples: 20,
        }
    }
}

impl VerifyOptions {
    pub fn tolerance_for(&self, column: &str) -> f64 {
        self.column_tolerances
            .get(column)
            .copied()
            .unwrap_or(self.tolerance)
    }

    pub fn validate(&self) -> Result<(), VerifyError> {
        let global = std::iter::once(("tolerance", self.tolerance));
        let overrides = self
            .column_tolerances
            .iter()
            .map(|(column, tolerance)| (column.as_str(), *tolerance));
        for (name, tolerance) in global.chain(overrides) {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(VerifyError::InvalidOptions(format!(
                    "tolerance for '{name}' must be a finite non-negative number, got {tolerance}"
                )));
            }
        }
        Ok(())
    }
}

/// Join state of a generated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Matched,
    Unmatched,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Matched => "matched",
            RowStatus::Unmatched => "unmatched",
        }
    }
}

/// Comparison of one numeric cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellOutcome {
    Compared {
        generated: f64,
        reference: f64,
        diff: f64,
        abs_error: f64,
        /// `None` when the reference value is zero.
        rel_error: Option<f64>,
        exceeds: bool,
    },
    /// Null on at least one side.
    Missing { generated: Value, reference: Value },
    /// Numeric on one side only.
    TypeMismatch { generated: Value, reference: Value },
    /// The row has no reference counterpart.
    Unmatched { generated: Value },
}

impl CellOutcome {
    /// Label written to the `<column>_flag` result column.
    pub fn flag(&self) -> &'static str {
        match self {
            CellOutcome::Compared { exceeds: true, .. } => "exceeds",
            CellOutcome::Compared { .. } => "ok",
            CellOutcome::Missing { .. } => "missing",
            CellOutcome::TypeMismatch { .. } => "type_mismatch",
            CellOutcome::Unmatched { .. } => "unmatched",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            CellOutcome::Compared { exceeds: true, .. } | CellOutcome::TypeMismatch { .. }
        )
    }
}

/// One generated row joined to its reference row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub key: Value,
    pub status: RowStatus,
    /// Aligned with [`Verification::numeric_columns`].
    pub numeric: Vec<CellOutcome>,
    /// Aligned with [`Verification::text_columns`].
    pub text: Vec<TextCell>,
}

/// Both sides of a shared non-numeric cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    pub generated: Value,
    pub reference: Value,
    /// `None` when either side is null or the row is unmatched.
    pub matches: Option<bool>,
}

/// Aggregate error statistics of one numeric column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnReport {
    pub column: String,
    pub tolerance: f64,
    pub compared: u64,
    pub exceeding: u64,
    pub undefined_rel: u64,
    pub missing: u64,
    pub type_mismatches: u64,
    pub max_abs_error: Option<f64>,
    pub max_rel_error: Option<f64>,
    pub mean_abs_error: Option<f64>,
    /// Share of generated rows with a compared value, in percent.
    pub coverage_pct: f64,
}

/// Equality summary of a shared non-numeric column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextColumnSummary {
    pub column: String,
    pub compared: u64,
    pub matches: u64,
    pub mismatches: u64,
    pub mismatch_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub key_column: String,
    pub generated_rows: u64,
    pub reference_rows: u64,
    pub matched: u64,
    pub unmatched_generated: u64,
    pub unmatched_reference: u64,
    pub cells_compared: u64,
    pub cells_exceeding: u64,
    pub type_mismatches: u64,
    /// No cell exceeds tolerance and no cell has mismatched types.
    pub within_tolerance: bool,
}

/// Result of comparing a generated table against a reference table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub verification_version: String,
    pub summary: VerificationSummary,
    pub numeric_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub columns: Vec<ColumnReport>,
    pub text_summaries: Vec<TextColumnSummary>,
    /// Reference keys with no generated counterpart, in reference order.
    pub unmatched_reference: Vec<Value>,
}

impl Verification {
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|report| report.column == name)
    }

    pub fn row(&self, key: &str) -> Option<&ResultRow> {
        self.rows
            .iter()
            .find(|row| sbdb_core::value_key(&row.key) == key)
    }

    /// Faulty cells as `(key, column, outcome)`, in row then column order.
    pub fn faults(&self) -> impl Iterator<Item = (&Value, &str, &CellOutcome)> {
        self.rows.iter().flat_map(move |row| {
            row.numeric
                .iter()
                .zip(&self.numeric_columns)
                .filter(|(outcome, _)| outcome.is_fault())
                .map(move |(outcome, column)| (&row.key, column.as_str(), outcome))
        })
    }
}
