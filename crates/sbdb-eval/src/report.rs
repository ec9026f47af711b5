use sbdb_core::value_key;

use crate::model::{CellOutcome, RowStatus, Verification};

/// Render a deterministic markdown report of a verification.
pub fn render_markdown(verification: &Verification, max_examples: usize) -> String {
    let summary = &verification.summary;
    let mut lines = Vec::new();

    lines.push("# SBDB Verification Report".to_string());
    lines.push(String::new());
    lines.push("## Summary".to_string());
    lines.push(format!("- key_column: {}", summary.key_column));
    lines.push(format!("- generated_rows: {}", summary.generated_rows));
    lines.push(format!("- reference_rows: {}", summary.reference_rows));
    lines.push(format!("- matched: {}", summary.matched));
    lines.push(format!("- unmatched_generated: {}", summary.unmatched_generated));
    lines.push(format!("- unmatched_reference: {}", summary.unmatched_reference));
    lines.push(format!("- cells_exceeding: {}", summary.cells_exceeding));
    lines.push(format!("- type_mismatches: {}", summary.type_mismatches));
    lines.push(format!("- within_tolerance: {}", summary.within_tolerance));
    lines.push(String::new());

    lines.push("## Numeric columns".to_string());
    if verification.columns.is_empty() {
        lines.push("- none".to_string());
    } else {
        lines.push(
            "| column | tolerance | compared | exceeding | undefined_rel | max_abs_error | max_rel_error | coverage_pct |"
                .to_string(),
        );
        lines.push("| --- | --- | --- | --- | --- | --- | --- | --- |".to_string());
        for report in &verification.columns {
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} | {} | {:.1} |",
                report.column,
                report.tolerance,
                report.compared,
                report.exceeding,
                report.undefined_rel,
                fmt_metric(report.max_abs_error),
                fmt_metric(report.max_rel_error),
                report.coverage_pct
            ));
        }
    }
    lines.push(String::new());

    if !verification.text_summaries.is_empty() {
        lines.push("## Text columns".to_string());
        lines.push("| column | compared | matches | mismatch_pct |".to_string());
        lines.push("| --- | --- | --- | --- |".to_string());
        for text in &verification.text_summaries {
            lines.push(format!(
                "| {} | {} | {} | {:.1} |",
                text.column, text.compared, text.matches, text.mismatch_pct
            ));
        }
        lines.push(String::new());
    }

    let faults: Vec<_> = verification.faults().take(max_examples).collect();
    if !faults.is_empty() {
        lines.push("## Top mismatches".to_string());
        for (key, column, outcome) in faults {
            let detail = match outcome {
                CellOutcome::Compared {
                    generated,
                    reference,
                    rel_error,
                    ..
                } => format!(
                    "generated={generated} reference={reference} rel_error={}",
                    fmt_metric(*rel_error)
                ),
                CellOutcome::TypeMismatch {
                    generated,
                    reference,
                } => format!("type mismatch: generated={generated} reference={reference}"),
                other => other.flag().to_string(),
            };
            lines.push(format!("- {}.{}: {}", value_key(key), column, detail));
        }
        lines.push(String::new());
    }

    let unmatched_generated: Vec<String> = verification
        .rows
        .iter()
        .filter(|row| row.status == RowStatus::Unmatched)
        .map(|row| value_key(&row.key))
        .take(max_examples)
        .collect();
    if !unmatched_generated.is_empty() || !verification.unmatched_reference.is_empty() {
        lines.push("## Coverage gaps".to_string());
        for key in unmatched_generated {
            lines.push(format!("- generated only: {key}"));
        }
        for key in verification.unmatched_reference.iter().take(max_examples) {
            lines.push(format!("- reference only: {}", value_key(key)));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn fmt_metric(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.6}"))
        .unwrap_or_else(|| "-".to_string())
}
