use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sbdb_core::Params;

/// Summary of one object batch run, written as `generation_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub combinations: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub attributes: Vec<String>,
    pub failures_by_stage: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_fingerprint: Option<String>,
    pub duration_ms: u64,
    /// Filled by [`crate::BatchOutput::report_with_failures`].
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<FailureRecord>,
}

/// Serializable form of a skipped combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub index: usize,
    pub stage: String,
    pub message: String,
    pub params: Params,
}

impl BatchReport {
    pub fn new(combinations: u64, attributes: Vec<String>) -> Self {
        Self {
            combinations,
            succeeded: 0,
            failed: 0,
            attributes,
            failures_by_stage: BTreeMap::new(),
            space_fingerprint: None,
            duration_ms: 0,
            failures: Vec::new(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.space_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, stage: &str) {
        self.failed += 1;
        *self
            .failures_by_stage
            .entry(stage.to_string())
            .or_insert(0) += 1;
    }
}
