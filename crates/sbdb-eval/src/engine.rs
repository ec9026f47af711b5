use std::collections::HashMap;
use std::time::Instant;

use serde_json::{Number, Value};
use tracing::{info, warn};

use sbdb_core::{ARTIFACT_VERSION, Table, as_number, join_key, value_key};

use crate::errors::VerifyError;
use crate::model::{
    CellOutcome, ColumnReport, ResultRow, RowStatus, TextCell, TextColumnSummary, Verification,
    VerificationSummary, VerifyOptions,
};

/// Compare a generated table against a reference table joined on a key.
#[derive(Debug, Clone)]
pub struct VerificationEngine<'a> {
    generated: &'a Table,
    reference: &'a Table,
    key_column: String,
    options: VerifyOptions,
}

impl<'a> VerificationEngine<'a> {
    pub fn new(
        generated: &'a Table,
        reference: &'a Table,
        key_column: impl Into<String>,
        options: VerifyOptions,
    ) -> Self {
        Self {
            generated,
            reference,
            key_column: key_column.into(),
            options,
        }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn compare(&self) -> Result<Verification, VerifyError> {
        let start = Instant::now();
        self.options.validate()?;

        let gen_key = key_index(self.generated, "generated", &self.key_column)?;
        let ref_key = key_index(self.reference, "reference", &self.key_column)?;
        let gen_lookup = key_lookup(self.generated, "generated", gen_key)?;
        let ref_lookup = key_lookup(self.reference, "reference", ref_key)?;

        let (numeric_columns, text_columns) = self.shared_columns();
        info!(
            key = %self.key_column,
            generated_rows = self.generated.len(),
            reference_rows = self.reference.len(),
            numeric_columns = numeric_columns.len(),
            text_columns = text_columns.len(),
            "verification started"
        );

        let numeric_idx = self.column_pairs(&numeric_columns);
        let text_idx = self.column_pairs(&text_columns);
        let tolerances: Vec<f64> = numeric_columns
            .iter()
            .map(|column| self.options.tolerance_for(column))
            .collect();

        let mut rows = Vec::with_capacity(self.generated.len());
        for gen_row in self.generated.rows() {
            let key = gen_row[gen_key].clone();
            let matched = ref_lookup
                .get(&join_key(&key))
                .map(|&idx| &self.reference.rows()[idx]);

            let row = match matched {
                Some(ref_row) => ResultRow {
                    key,
                    status: RowStatus::Matched,
                    numeric: numeric_idx
                        .iter()
                        .zip(&tolerances)
                        .map(|(&(g, r), &tolerance)| {
                            compare_numeric(&gen_row[g], &ref_row[r], tolerance)
                        })
                        .collect(),
                    text: text_idx
                        .iter()
                        .map(|&(g, r)| compare_text(&gen_row[g], &ref_row[r]))
                        .collect(),
                },
                None => ResultRow {
                    key,
                    status: RowStatus::Unmatched,
                    numeric: numeric_idx
                        .iter()
                        .map(|&(g, _)| CellOutcome::Unmatched {
                            generated: gen_row[g].clone(),
                        })
                        .collect(),
                    text: text_idx
                        .iter()
                        .map(|&(g, _)| TextCell {
                            generated: gen_row[g].clone(),
                            reference: Value::Null,
                            matches: None,
                        })
                        .collect(),
                },
            };
            rows.push(row);
        }

        let unmatched_reference: Vec<Value> = self
            .reference
            .rows()
            .iter()
            .map(|row| &row[ref_key])
            .filter(|key| !gen_lookup.contains_key(&join_key(key)))
            .cloned()
            .collect();

        let columns: Vec<ColumnReport> = numeric_columns
            .iter()
            .enumerate()
            .map(|(pos, column)| column_report(column, tolerances[pos], pos, &rows))
            .collect();
        let text_summaries: Vec<TextColumnSummary> = text_columns
            .iter()
            .enumerate()
            .map(|(pos, column)| text_summary(column, pos, &rows))
            .collect();

        let matched = rows
            .iter()
            .filter(|row| row.status == RowStatus::Matched)
            .count() as u64;
        let cells_compared: u64 = columns.iter().map(|report| report.compared).sum();
        let cells_exceeding: u64 = columns.iter().map(|report| report.exceeding).sum();
        let type_mismatches: u64 = columns.iter().map(|report| report.type_mismatches).sum();
        let summary = VerificationSummary {
            key_column: self.key_column.clone(),
            generated_rows: self.generated.len() as u64,
            reference_rows: self.reference.len() as u64,
            matched,
            unmatched_generated: rows.len() as u64 - matched,
            unmatched_reference: unmatched_reference.len() as u64,
            cells_compared,
            cells_exceeding,
            type_mismatches,
            within_tolerance: cells_exceeding == 0 && type_mismatches == 0,
        };

        if summary.unmatched_generated > 0 || summary.unmatched_reference > 0 {
            warn!(
                unmatched_generated = summary.unmatched_generated,
                unmatched_reference = summary.unmatched_reference,
                "verification coverage gaps"
            );
        }
        info!(
            matched = summary.matched,
            cells_compared = summary.cells_compared,
            cells_exceeding = summary.cells_exceeding,
            type_mismatches = summary.type_mismatches,
            duration_ms = start.elapsed().as_millis() as u64,
            "verification completed"
        );

        Ok(Verification {
            verification_version: ARTIFACT_VERSION.to_string(),
            summary,
            numeric_columns,
            text_columns,
            rows,
            columns,
            text_summaries,
            unmatched_reference,
        })
    }

    /// Columns present in both tables (excluding the key), split into
    /// numeric and text, in generated-table order.
    fn shared_columns(&self) -> (Vec<String>, Vec<String>) {
        let mut numeric = Vec::new();
        let mut text = Vec::new();
        for column in self.generated.columns() {
            if *column == self.key_column || !self.reference.has_column(column) {
                continue;
            }
            let generated = numeric_kind(self.generated, column);
            let is_numeric = match generated {
                Some(kind) => kind,
                None => numeric_kind(self.reference, column).unwrap_or(false),
            };
            if is_numeric {
                numeric.push(column.clone());
            } else {
                text.push(column.clone());
            }
        }
        (numeric, text)
    }

    fn column_pairs(&self, columns: &[String]) -> Vec<(usize, usize)> {
        columns
            .iter()
            .filter_map(|column| {
                Some((
                    self.generated.column_index(column)?,
                    self.reference.column_index(column)?,
                ))
            })
            .collect()
    }
}

fn key_index(table: &Table, label: &str, key_column: &str) -> Result<usize, VerifyError> {
    table
        .column_index(key_column)
        .ok_or_else(|| VerifyError::MissingKeyColumn {
            table: label.to_string(),
            column: key_column.to_string(),
        })
}

fn key_lookup(
    table: &Table,
    label: &str,
    key_idx: usize,
) -> Result<HashMap<String, usize>, VerifyError> {
    let mut lookup = HashMap::with_capacity(table.len());
    for (row_idx, row) in table.rows().iter().enumerate() {
        if let Some(first_row) = lookup.insert(join_key(&row[key_idx]), row_idx) {
            return Err(VerifyError::DuplicateKey {
                table: label.to_string(),
                key: value_key(&row[key_idx]),
                first_row,
                second_row: row_idx,
            });
        }
    }
    Ok(lookup)
}

/// `Some(true)` when every non-null cell is a number, `None` when the
/// column has no non-null cells.
fn numeric_kind(table: &Table, column: &str) -> Option<bool> {
    let values = table.column_values(column).ok()?;
    let mut present = values.into_iter().filter(|value| !value.is_null()).peekable();
    present.peek()?;
    Some(present.all(|value| value.is_number()))
}

fn compare_numeric(generated: &Value, reference: &Value, tolerance: f64) -> CellOutcome {
    if generated.is_null() || reference.is_null() {
        return CellOutcome::Missing {
            generated: generated.clone(),
            reference: reference.clone(),
        };
    }
    let (Some(g), Some(r)) = (as_number(generated), as_number(reference)) else {
        return CellOutcome::TypeMismatch {
            generated: generated.clone(),
            reference: reference.clone(),
        };
    };

    let diff = g - r;
    let abs_error = diff.abs();
    let rel_error = (r != 0.0).then(|| abs_error / r.abs());
    let exceeds = match rel_error {
        Some(rel) => rel > tolerance,
        None => abs_error > 0.0,
    };
    CellOutcome::Compared {
        generated: g,
        reference: r,
        diff,
        abs_error,
        rel_error,
        exceeds,
    }
}

fn compare_text(generated: &Value, reference: &Value) -> TextCell {
    let matches = (!generated.is_null() && !reference.is_null())
        .then(|| join_key(generated) == join_key(reference));
    TextCell {
        generated: generated.clone(),
        reference: reference.clone(),
        matches,
    }
}

fn column_report(column: &str, tolerance: f64, pos: usize, rows: &[ResultRow]) -> ColumnReport {
    let mut report = ColumnReport {
        column: column.to_string(),
        tolerance,
        compared: 0,
        exceeding: 0,
        undefined_rel: 0,
        missing: 0,
        type_mismatches: 0,
        max_abs_error: None,
        max_rel_error: None,
        mean_abs_error: None,
        coverage_pct: 0.0,
    };

    let mut abs_sum = 0.0;
    for row in rows {
        match &row.numeric[pos] {
            CellOutcome::Compared {
                abs_error,
                rel_error,
                exceeds,
                ..
            } => {
                report.compared += 1;
                abs_sum += abs_error;
                if *exceeds {
                    report.exceeding += 1;
                }
                report.max_abs_error = Some(max_of(report.max_abs_error, *abs_error));
                match rel_error {
                    Some(rel) => report.max_rel_error = Some(max_of(report.max_rel_error, *rel)),
                    None => report.undefined_rel += 1,
                }
            }
            CellOutcome::Missing { .. } => report.missing += 1,
            CellOutcome::TypeMismatch { .. } => report.type_mismatches += 1,
            CellOutcome::Unmatched { .. } => {}
        }
    }

    if report.compared > 0 {
        report.mean_abs_error = Some(abs_sum / report.compared as f64);
    }
    if !rows.is_empty() {
        report.coverage_pct = report.compared as f64 / rows.len() as f64 * 100.0;
    }
    report
}

fn max_of(current: Option<f64>, value: f64) -> f64 {
    current.map_or(value, |max| max.max(value))
}

fn text_summary(column: &str, pos: usize, rows: &[ResultRow]) -> TextColumnSummary {
    let outcomes: Vec<bool> = rows.iter().filter_map(|row| row.text[pos].matches).collect();
    let matches = outcomes.iter().filter(|matched| **matched).count() as u64;
    let compared = outcomes.len() as u64;
    let mismatches = compared - matches;
    TextColumnSummary {
        column: column.to_string(),
        compared,
        matches,
        mismatches,
        mismatch_pct: if compared == 0 {
            0.0
        } else {
            mismatches as f64 / compared as f64 * 100.0
        },
    }
}

impl Verification {
    /// One row per generated key: status, then per numeric column the
    /// generated and reference values, signed difference, relative error
    /// and flag, then per text column both values and a match flag.
    pub fn result_table(&self) -> Result<Table, VerifyError> {
        let mut columns = vec![self.summary.key_column.clone(), "_status".to_string()];
        for column in &self.numeric_columns {
            for suffix in ["generated", "reference", "diff", "rel_error", "flag"] {
                columns.push(format!("{column}_{suffix}"));
            }
        }
        for column in &self.text_columns {
            for suffix in ["generated", "reference", "flag"] {
                columns.push(format!("{column}_{suffix}"));
            }
        }
        let mut table = Table::new(columns)?;

        for row in &self.rows {
            let mut cells = vec![row.key.clone(), Value::String(row.status.as_str().to_string())];
            for outcome in &row.numeric {
                cells.extend(numeric_cells(outcome));
            }
            for cell in &row.text {
                let flag = match (row.status, cell.matches) {
                    (RowStatus::Unmatched, _) => "unmatched",
                    (_, Some(true)) => "match",
                    (_, Some(false)) => "mismatch",
                    (_, None) => "missing",
                };
                cells.push(cell.generated.clone());
                cells.push(cell.reference.clone());
                cells.push(Value::String(flag.to_string()));
            }
            table.push_row(cells)?;
        }
        Ok(table)
    }

    /// One row per compared numeric column.
    pub fn report_table(&self) -> Result<Table, VerifyError> {
        let mut table = Table::new([
            "column",
            "tolerance",
            "compared",
            "exceeding",
            "undefined_rel",
            "missing",
            "type_mismatches",
            "max_abs_error",
            "max_rel_error",
            "mean_abs_error",
            "coverage_pct",
        ])?;
        for report in &self.columns {
            table.push_row(vec![
                Value::String(report.column.clone()),
                float_cell(Some(report.tolerance)),
                Value::from(report.compared),
                Value::from(report.exceeding),
                Value::from(report.undefined_rel),
                Value::from(report.missing),
                Value::from(report.type_mismatches),
                float_cell(report.max_abs_error),
                float_cell(report.max_rel_error),
                float_cell(report.mean_abs_error),
                float_cell(Some(report.coverage_pct)),
            ])?;
        }
        Ok(table)
    }
}

fn numeric_cells(outcome: &CellOutcome) -> [Value; 5] {
    let flag = Value::String(outcome.flag().to_string());
    match outcome {
        CellOutcome::Compared {
            generated,
            reference,
            diff,
            rel_error,
            ..
        } => [
            float_cell(Some(*generated)),
            float_cell(Some(*reference)),
            float_cell(Some(*diff)),
            float_cell(*rel_error),
            flag,
        ],
        CellOutcome::Missing {
            generated,
            reference,
        }
        | CellOutcome::TypeMismatch {
            generated,
            reference,
        } => [generated.clone(), reference.clone(), Value::Null, Value::Null, flag],
        CellOutcome::Unmatched { generated } => {
            [generated.clone(), Value::Null, Value::Null, Value::Null, flag]
        }
    }
}

fn float_cell(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_reference_has_undefined_relative_error() {
        let outcome = compare_numeric(&json!(0.0), &json!(0), 0.01);
        assert_eq!(
            outcome,
            CellOutcome::Compared {
                generated: 0.0,
                reference: 0.0,
                diff: 0.0,
                abs_error: 0.0,
                rel_error: None,
                exceeds: false,
            }
        );

        let outcome = compare_numeric(&json!(0.5), &json!(0), 0.01);
        assert_eq!(outcome.flag(), "exceeds");
    }

    #[test]
    fn null_and_text_cells_are_not_compared() {
        let outcome = compare_numeric(&Value::Null, &json!(3), 0.01);
        assert_eq!(outcome.flag(), "missing");
        let outcome = compare_numeric(&json!(3), &json!("three"), 0.01);
        assert_eq!(outcome.flag(), "type_mismatch");
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let outcome = compare_numeric(&json!(101.0), &json!(100.0), 0.01);
        assert_eq!(outcome.flag(), "ok");
        let outcome = compare_numeric(&json!(98.0), &json!(100.0), 0.01);
        assert_eq!(outcome.flag(), "exceeds");
    }

    #[test]
    fn numeric_kind_ignores_nulls() {
        let table = Table::with_rows(
            ["a", "b", "c"],
            vec![
                vec![json!(1), Value::Null, json!("x")],
                vec![Value::Null, Value::Null, json!(2)],
            ],
        )
        .unwrap();
        assert_eq!(numeric_kind(&table, "a"), Some(true));
        assert_eq!(numeric_kind(&table, "b"), None);
        assert_eq!(numeric_kind(&table, "c"), Some(false));
    }
}
