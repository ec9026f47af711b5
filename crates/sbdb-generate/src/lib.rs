//! Design-space enumeration and bulk object instantiation.
//!
//! [`VariableSpace`] expands named variable domains into the ordered
//! Cartesian product of parameter combinations; [`ObjectBatch`] turns each
//! combination into an instance through a caller-supplied constructor and
//! projects the successful instances into a [`sbdb_core::Table`].

pub mod batch;
pub mod contract;
pub mod errors;
pub mod model;
pub mod progress;
pub mod space;

pub use batch::{AttributeAccess, BatchFailure, BatchItem, BatchOutput, ObjectBatch};
pub use contract::{VariableSetFile, variable_set_json_schema};
pub use errors::{BatchError, ItemError, SpaceError};
pub use model::{BatchReport, FailureRecord};
pub use progress::{BatchProgress, LogProgress, ProgressSink};
pub use space::{Variable, VariableSpace, VariableWeights};
