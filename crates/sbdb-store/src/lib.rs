//! Persistence side of SBDB: record sinks, collection files and the
//! dataset generation ledger.

pub mod collection;
pub mod errors;
pub mod sink;
pub mod tracker;

pub use collection::{
    ExportedCollection, PopulationOutcome, export_collection, import_csv_table, populate_collections,
};
pub use errors::StoreError;
pub use sink::{JsonDirSink, MemorySink, RecordSink};
pub use tracker::{
    Categorise, DatasetRecord, DatasetTracker, DefaultCategorise, PackageVersions, TrackOperation,
    TrackerLayout, TrackerStatus,
};
