use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use sbdb_core::{Params, Table, value_key};

use crate::errors::{BatchError, ItemError};
use crate::model::{BatchReport, FailureRecord};
use crate::progress::{BatchProgress, ProgressSink};

/// Uniform named-field access on an otherwise opaque instance.
pub trait AttributeAccess {
    /// Value of the named attribute, or `None` when the instance lacks it.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Attributes reported when the caller does not name any.
    fn declared_attributes() -> Vec<String>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

impl AttributeAccess for Params {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A combination that could not be turned into a reportable instance.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub index: usize,
    pub params: Params,
    pub error: ItemError,
}

impl BatchFailure {
    fn to_record(&self) -> FailureRecord {
        FailureRecord {
            index: self.index,
            stage: self.error.stage().to_string(),
            message: self.error.to_string(),
            params: self.params.clone(),
        }
    }
}

/// One slot of a batch, aligned with its combination.
#[derive(Debug, Clone)]
pub enum BatchItem<T> {
    Built(T),
    Failed(BatchFailure),
}

impl<T> BatchItem<T> {
    pub fn instance(&self) -> Option<&T> {
        match self {
            BatchItem::Built(instance) => Some(instance),
            BatchItem::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&BatchFailure> {
        match self {
            BatchItem::Built(_) => None,
            BatchItem::Failed(failure) => Some(failure),
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, BatchItem::Built(_))
    }
}

/// Instantiates one object per combination through an injected constructor.
///
/// Failures are isolated per combination: a constructor error, a panic, or
/// a missing report attribute turns that slot into a [`BatchFailure`] and the
/// run moves on.
pub struct ObjectBatch<F> {
    factory: F,
    combinations: Arc<[Params]>,
    report_attrs: Vec<String>,
    header: Table,
}

impl<F> ObjectBatch<F> {
    pub fn new<I, S>(factory: F, combinations: Vec<Params>, report_attrs: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let report_attrs: Vec<String> = report_attrs.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(report_attrs.len());
        for attr in &report_attrs {
            if !seen.insert(attr.as_str()) {
                return Err(BatchError::DuplicateAttribute(attr.clone()));
            }
        }
        let header = Table::new(report_attrs.iter().cloned())
            .map_err(|err| BatchError::DuplicateAttribute(err.to_string()))?;

        Ok(Self {
            factory,
            combinations: Arc::from(combinations),
            report_attrs,
            header,
        })
    }

    /// Report the attributes declared by the instance type.
    pub fn with_declared_attributes<T, E>(
        factory: F,
        combinations: Vec<Params>,
    ) -> Result<Self, BatchError>
    where
        F: Fn(&Params) -> Result<T, E>,
        T: AttributeAccess,
    {
        Self::new(factory, combinations, T::declared_attributes())
    }

    pub fn combinations(&self) -> &[Params] {
        &self.combinations
    }

    pub fn report_attrs(&self) -> &[String] {
        &self.report_attrs
    }

    /// Build every combination in order.
    pub fn run<T, E>(&self, mut progress: Option<&mut dyn ProgressSink>) -> BatchOutput<T>
    where
        F: Fn(&Params) -> Result<T, E>,
        T: AttributeAccess,
        E: Display,
    {
        let start = Instant::now();
        let total = self.combinations.len();
        let mut table = self.header.clone();
        let mut instances = Vec::with_capacity(total);
        let mut row_origins = Vec::new();
        let mut report = BatchReport::new(total as u64, self.report_attrs.clone());

        info!(
            combinations = total,
            attributes = self.report_attrs.len(),
            "object batch started"
        );

        for (index, params) in self.combinations.iter().enumerate() {
            let outcome = build_item(&self.factory, params, &self.report_attrs).and_then(
                |(instance, row)| match table.push_row(row) {
                    Ok(()) => Ok(instance),
                    Err(err) => Err(ItemError::Construction {
                        message: err.to_string(),
                    }),
                },
            );

            match outcome {
                Ok(instance) => {
                    row_origins.push(index);
                    report.record_success();
                    instances.push(BatchItem::Built(instance));
                }
                Err(error) => {
                    warn!(index, stage = error.stage(), error = %error, "combination skipped");
                    let failure = BatchFailure {
                        index,
                        params: params.clone(),
                        error,
                    };
                    report.record_failure(failure.error.stage());
                    instances.push(BatchItem::Failed(failure));
                }
            }

            if let Some(sink) = progress.as_deref_mut() {
                notify(
                    sink,
                    BatchProgress {
                        processed: index + 1,
                        failed: report.failed as usize,
                        total,
                    },
                );
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            combinations = total,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "object batch completed"
        );

        BatchOutput {
            combinations: Arc::clone(&self.combinations),
            instances,
            table,
            row_origins,
            report,
        }
    }

    /// Drop every combination whose reported row matches `predicate`.
    ///
    /// `output` must come from running this batch over its current
    /// combinations; an output from another batch, or from before an earlier
    /// reduction, is rejected with [`BatchError::StaleOutput`]. Returns the
    /// number of combinations removed. Re-run the batch to rebuild the output
    /// over the reduced space.
    pub fn reduce_design_space<T, P>(
        &mut self,
        output: &BatchOutput<T>,
        predicate: P,
    ) -> Result<usize, BatchError>
    where
        P: Fn(&Params) -> bool,
    {
        if !Arc::ptr_eq(&output.combinations, &self.combinations) {
            return Err(BatchError::StaleOutput);
        }

        let remove: HashSet<usize> = (0..output.table.len())
            .filter(|row| {
                output
                    .table
                    .record(*row)
                    .is_some_and(|record| predicate(&record))
            })
            .map(|row| output.row_origins[row])
            .collect();
        if remove.is_empty() {
            return Ok(0);
        }

        let before = self.combinations.len();
        let kept: Vec<Params> = self
            .combinations
            .iter()
            .enumerate()
            .filter(|(index, _)| !remove.contains(index))
            .map(|(_, params)| params.clone())
            .collect();
        self.combinations = Arc::from(kept);
        let removed = before - self.combinations.len();
        debug!(removed, remaining = self.combinations.len(), "design space reduced");
        Ok(removed)
    }
}

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchOutput<T> {
    combinations: Arc<[Params]>,
    instances: Vec<BatchItem<T>>,
    table: Table,
    row_origins: Vec<usize>,
    report: BatchReport,
}

impl<T> BatchOutput<T> {
    /// One slot per combination, in combination order.
    pub fn instances(&self) -> &[BatchItem<T>] {
        &self.instances
    }

    /// Attribute rows of successful instances, in combination order.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Run counters. Failure details stay in [`Self::instances`]; see
    /// [`Self::report_with_failures`].
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// The run report with one [`FailureRecord`] per skipped combination,
    /// as written to `generation_report.json`.
    pub fn report_with_failures(&self) -> BatchReport {
        let mut report = self.report.clone();
        report.failures = self.failures().map(BatchFailure::to_record).collect();
        report
    }

    /// The combinations this output was built from.
    pub fn combinations(&self) -> &[Params] {
        &self.combinations
    }

    /// Combination index that produced table row `row`.
    pub fn row_origin(&self, row: usize) -> Option<usize> {
        self.row_origins.get(row).copied()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.instances.iter().filter_map(BatchItem::failure)
    }

    pub fn skipped_indices(&self) -> Vec<usize> {
        self.failures().map(|failure| failure.index).collect()
    }

    /// Successful instances with their combination index.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &T)> {
        self.instances
            .iter()
            .enumerate()
            .filter_map(|(index, item)| item.instance().map(|instance| (index, instance)))
    }

    /// Index the instances by the text form of one reported column.
    pub fn make_name_dict(&self, column: &str) -> sbdb_core::Result<BTreeMap<String, &T>> {
        let names = self.table.column_values(column)?;
        Ok(names
            .into_iter()
            .zip(&self.row_origins)
            .filter_map(|(name, origin)| {
                self.instances[*origin]
                    .instance()
                    .map(|instance| (value_key(name), instance))
            })
            .collect())
    }

    pub fn into_parts(self) -> (Vec<BatchItem<T>>, Table, BatchReport) {
        (self.instances, self.table, self.report)
    }
}

fn build_item<F, T, E>(
    factory: &F,
    params: &Params,
    attrs: &[String],
) -> Result<(T, Vec<Value>), ItemError>
where
    F: Fn(&Params) -> Result<T, E>,
    T: AttributeAccess,
    E: Display,
{
    let instance = match catch_unwind(AssertUnwindSafe(|| factory(params))) {
        Ok(Ok(instance)) => instance,
        Ok(Err(err)) => {
            return Err(ItemError::Construction {
                message: err.to_string(),
            });
        }
        Err(panic) => {
            return Err(ItemError::Panicked {
                message: panic_message(panic),
            });
        }
    };

    let row = attrs
        .iter()
        .map(|attr| {
            instance
                .attribute(attr)
                .ok_or_else(|| ItemError::AttributeProjection {
                    attribute: attr.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((instance, row))
}

fn notify(sink: &mut dyn ProgressSink, progress: BatchProgress) {
    if catch_unwind(AssertUnwindSafe(|| sink.record(progress))).is_err() {
        debug!(processed = progress.processed, "progress sink panicked");
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
