//! Core contracts shared across the SBDB crates.
//!
//! Defines the parameter and cell value model, the in-memory [`Table`]
//! projection and its CSV/JSON codecs.

pub mod error;
pub mod input;
pub mod output;
pub mod table;
pub mod value;

pub use error::{Error, Result};
pub use input::{read_csv, read_table_csv};
pub use output::{write_csv, write_table_csv, write_table_json_columns, write_table_json_records};
pub use table::Table;
pub use value::{Params, as_number, join_key, parse_cell, render_cell, value_key};

/// Version tag stamped into generated artifacts.
pub const ARTIFACT_VERSION: &str = "0.1";
