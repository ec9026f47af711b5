use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use sbdb_core::{Params, Table, write_table_json_records};

use crate::errors::StoreError;

/// Destination for tabular collections, one record per table row.
///
/// Connection lifecycle belongs to the implementation's owner.
pub trait RecordSink {
    /// Store `table` under `name`, replacing any previous contents.
    /// Returns the number of records written.
    fn write_collection(&mut self, name: &str, table: &Table) -> Result<u64, StoreError>;
}

/// Writes each collection as `<dir>/<name>.json`, an array of row objects.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl RecordSink for JsonDirSink {
    fn write_collection(&mut self, name: &str, table: &Table) -> Result<u64, StoreError> {
        validate_collection_name(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let path = self.collection_path(name);
        let bytes = write_table_json_records(&path, table)?;
        info!(
            collection = name,
            records = table.len(),
            bytes,
            path = %path.display(),
            "collection written"
        );
        Ok(table.len() as u64)
    }
}

/// Keeps collections in memory; useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    collections: BTreeMap<String, Vec<Params>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, name: &str) -> Option<&[Params]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

impl RecordSink for MemorySink {
    fn write_collection(&mut self, name: &str, table: &Table) -> Result<u64, StoreError> {
        validate_collection_name(name)?;
        let records = table.records();
        let count = records.len() as u64;
        self.collections.insert(name.to_string(), records);
        Ok(count)
    }
}

/// Collection names become file stems, so path syntax is rejected.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_sink_stores_one_record_per_row() {
        let table = Table::with_rows(
            ["name", "d_f"],
            vec![vec![json!("M16"), json!(16)], vec![json!("M20"), json!(20)]],
        )
        .unwrap();
        let mut sink = MemorySink::new();
        assert_eq!(sink.write_collection("bolts", &table).unwrap(), 2);

        let records = sink.collection("bolts").unwrap();
        assert_eq!(records[1]["d_f"], json!(20));
        assert_eq!(sink.names().collect::<Vec<_>>(), ["bolts"]);
    }

    #[test]
    fn path_like_names_are_rejected() {
        for name in ["", "  ", "..", "a/b", "a\\b"] {
            assert!(validate_collection_name(name).is_err(), "{name:?}");
        }
        assert!(validate_collection_name("steel_beams_collection").is_ok());
    }
}
