use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use sbdb_core::{Params, Table, read_table_csv, write_table_csv, write_table_json_records};

use crate::errors::StoreError;
use crate::sink::{RecordSink, validate_collection_name};

/// Files written by [`export_collection`].
#[derive(Debug, Clone, Serialize)]
pub struct ExportedCollection {
    /// File stem shared by both files, `<name>_collection`.
    pub collection: String,
    pub records: u64,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub csv_bytes: u64,
    pub json_bytes: u64,
}

/// Write `table` as `<csv_dir>/<name>_collection.csv` and
/// `<json_dir>/<name>_collection.json` (array of row objects).
pub fn export_collection(
    table: &Table,
    name: &str,
    csv_dir: &Path,
    json_dir: &Path,
) -> Result<ExportedCollection, StoreError> {
    validate_collection_name(name)?;
    std::fs::create_dir_all(csv_dir)?;
    std::fs::create_dir_all(json_dir)?;

    let collection = format!("{name}_collection");
    let csv_path = csv_dir.join(format!("{collection}.csv"));
    let json_path = json_dir.join(format!("{collection}.json"));
    let csv_bytes = write_table_csv(&csv_path, table)?;
    let json_bytes = write_table_json_records(&json_path, table)?;

    info!(
        collection = %collection,
        records = table.len(),
        csv_bytes,
        json_bytes,
        "collection exported"
    );
    Ok(ExportedCollection {
        collection,
        records: table.len() as u64,
        csv_path,
        json_path,
        csv_bytes,
        json_bytes,
    })
}

/// Load a reference library from CSV, skipping `skip_rows` rows after the
/// header (unit rows).
pub fn import_csv_table(path: &Path, skip_rows: usize) -> Result<Table, StoreError> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    Ok(read_table_csv(path, skip_rows)?)
}

/// Outcome of loading one `(collection, file)` pair into a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationOutcome {
    pub collection: String,
    pub file: String,
    /// `None` when the file was missing and skipped.
    pub inserted: Option<u64>,
}

/// Load `<json_dir>/<file>.json` record arrays into `sink`, one
/// `(collection, file)` pair at a time. Missing files are skipped.
pub fn populate_collections(
    json_dir: &Path,
    population: &[(String, String)],
    sink: &mut dyn RecordSink,
) -> Result<Vec<PopulationOutcome>, StoreError> {
    let mut outcomes = Vec::with_capacity(population.len());
    for (collection, file) in population {
        let path = json_dir.join(format!("{file}.json"));
        if !path.is_file() {
            warn!(path = %path.display(), collection = %collection, "population file not found, skipping");
            outcomes.push(PopulationOutcome {
                collection: collection.clone(),
                file: file.clone(),
                inserted: None,
            });
            continue;
        }

        let records: Vec<Params> = match serde_json::from_slice::<Value>(&std::fs::read(&path)?)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(sbdb_core::Error::MalformedTable(format!(
                        "{} holds a non-object record: {other}",
                        path.display()
                    ))),
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(StoreError::Table(sbdb_core::Error::MalformedTable(format!(
                    "{} must hold an array of records",
                    path.display()
                ))));
            }
        };

        let table = Table::from_records(&records)?;
        let inserted = sink.write_collection(collection, &table)?;
        info!(collection = %collection, file = %file, inserted, "collection populated");
        outcomes.push(PopulationOutcome {
            collection: collection.clone(),
            file: file.clone(),
            inserted: Some(inserted),
        });
    }
    Ok(outcomes)
}
