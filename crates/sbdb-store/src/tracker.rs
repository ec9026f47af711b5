use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::sink::validate_collection_name;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Assigns `(category, dataset_type)` to a collection name.
pub trait Categorise {
    fn categorise(&self, collection: &str) -> (String, String);
}

/// Every collection is `general` / `dataset`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCategorise;

impl Categorise for DefaultCategorise {
    fn categorise(&self, _collection: &str) -> (String, String) {
        ("general".to_string(), "dataset".to_string())
    }
}

impl<F> Categorise for F
where
    F: Fn(&str) -> (String, String),
{
    fn categorise(&self, collection: &str) -> (String, String) {
        self(collection)
    }
}

/// Lifecycle step stamped onto a collection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOperation {
    Generation,
    DatasetVerification,
    DatabasePopulation,
    DatabaseVerification,
}

impl TrackOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackOperation::Generation => "generation",
            TrackOperation::DatasetVerification => "dataset_verification",
            TrackOperation::DatabasePopulation => "database_population",
            TrackOperation::DatabaseVerification => "database_verification",
        }
    }
}

impl fmt::Display for TrackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackOperation {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "generation" => Ok(TrackOperation::Generation),
            "dataset_verification" => Ok(TrackOperation::DatasetVerification),
            "database_population" => Ok(TrackOperation::DatabasePopulation),
            "database_verification" => Ok(TrackOperation::DatabaseVerification),
            other => Err(StoreError::UnknownOperation(other.to_string())),
        }
    }
}

/// Package versions stamped on generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersions {
    pub main_package: String,
    pub framework_package: String,
}

impl Default for PackageVersions {
    fn default() -> Self {
        Self {
            main_package: "Unknown".to_string(),
            framework_package: "Unknown".to_string(),
        }
    }
}

/// Where the ledger and the collection files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerLayout {
    pub base_dir: PathBuf,
    pub datasets_subdir: String,
    pub csv_subdir: String,
    pub json_subdir: String,
    pub record_filename: String,
}

impl TrackerLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            datasets_subdir: "datasets".to_string(),
            csv_subdir: "collections_csv".to_string(),
            json_subdir: "collections_json".to_string(),
            record_filename: "dataset_generation_record.csv".to_string(),
        }
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.base_dir.join(&self.datasets_subdir)
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.datasets_dir().join(&self.csv_subdir)
    }

    pub fn json_dir(&self) -> PathBuf {
        self.datasets_dir().join(&self.json_subdir)
    }

    pub fn record_path(&self) -> PathBuf {
        self.base_dir.join(&self.record_filename)
    }

    fn relative_csv(&self, collection: &str) -> String {
        format!("{}/{}/{collection}.csv", self.datasets_subdir, self.csv_subdir)
    }

    fn relative_json(&self, collection: &str) -> String {
        format!("{}/{}/{collection}.json", self.datasets_subdir, self.json_subdir)
    }
}

/// One row of `dataset_generation_record.csv`. Empty dates mean the step
/// has not happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub collection_name: String,
    pub category: String,
    pub dataset_type: String,
    #[serde(default)]
    pub last_generation_date: String,
    #[serde(default)]
    pub dataset_verification_date: String,
    #[serde(default)]
    pub database_population_date: String,
    #[serde(default)]
    pub database_verification_date: String,
    #[serde(default)]
    pub main_package_version: String,
    #[serde(default)]
    pub framework_package_version: String,
    pub record_count: u64,
    pub csv_size_mb: f64,
    pub json_size_mb: f64,
    #[serde(default)]
    pub csv_file_path: String,
    #[serde(default)]
    pub json_file_path: String,
    pub csv_exists: bool,
    pub json_exists: bool,
    #[serde(default)]
    pub notes: String,
}

impl DatasetRecord {
    fn stamp(&mut self, operation: TrackOperation, at: String) {
        let field = match operation {
            TrackOperation::Generation => &mut self.last_generation_date,
            TrackOperation::DatasetVerification => &mut self.dataset_verification_date,
            TrackOperation::DatabasePopulation => &mut self.database_population_date,
            TrackOperation::DatabaseVerification => &mut self.database_verification_date,
        };
        *field = at;
    }

    fn apply_metadata(&mut self, metadata: &FileMetadata) {
        self.record_count = metadata.record_count;
        self.csv_size_mb = metadata.csv_size_mb;
        self.json_size_mb = metadata.json_size_mb;
        self.csv_exists = metadata.csv_exists;
        self.json_exists = metadata.json_exists;
    }

    fn append_note(&mut self, note: &str) {
        if self.notes.is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes = format!("{}; {note}", self.notes);
        }
    }
}

/// Counts per lifecycle step and per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub total: u64,
    pub generated: u64,
    pub dataset_verified: u64,
    pub database_populated: u64,
    pub database_verified: u64,
    pub by_category: BTreeMap<String, u64>,
}

impl TrackerStatus {
    /// Share of `count` over all collections, in percent.
    pub fn percent(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FileMetadata {
    record_count: u64,
    csv_size_mb: f64,
    json_size_mb: f64,
    csv_exists: bool,
    json_exists: bool,
}

/// CSV ledger of dataset generation, verification and population.
pub struct DatasetTracker {
    layout: TrackerLayout,
    versions: PackageVersions,
    categorise: Box<dyn Categorise>,
}

impl DatasetTracker {
    pub fn new(layout: TrackerLayout) -> Self {
        Self {
            layout,
            versions: PackageVersions::default(),
            categorise: Box::new(DefaultCategorise),
        }
    }

    pub fn with_versions(mut self, versions: PackageVersions) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_categorise(mut self, categorise: impl Categorise + 'static) -> Self {
        self.categorise = Box::new(categorise);
        self
    }

    pub fn layout(&self) -> &TrackerLayout {
        &self.layout
    }

    /// Rebuild the ledger from the collection CSV files on disk, sorted by
    /// category then name. Returns the number of records written.
    pub fn initialise(&self) -> Result<usize, StoreError> {
        let csv_dir = self.layout.csv_dir();
        let mut records = Vec::new();
        if csv_dir.is_dir() {
            for entry in std::fs::read_dir(&csv_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                    continue;
                }
                let Some(collection) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };

                let mut record = self.new_record(collection);
                let metadata = self.file_metadata(collection);
                record.apply_metadata(&metadata);
                if !metadata.json_exists {
                    record.json_file_path.clear();
                }
                records.push(record);
            }
        }

        records.sort_by(|a, b| {
            (&a.category, &a.collection_name).cmp(&(&b.category, &b.collection_name))
        });
        self.save(&records)?;
        info!(
            collections = records.len(),
            path = %self.layout.record_path().display(),
            "dataset record initialised"
        );
        Ok(records.len())
    }

    /// Stamp `operation` onto `collection`, adding the record when missing.
    ///
    /// A generation also refreshes package versions and file metadata.
    /// `notes` are appended to existing notes with `"; "`.
    pub fn update(
        &self,
        collection: &str,
        operation: TrackOperation,
        notes: Option<&str>,
    ) -> Result<DatasetRecord, StoreError> {
        validate_collection_name(collection)?;
        if !self.layout.record_path().is_file() {
            self.initialise()?;
        }

        let mut records = self.load()?;
        let position = match records
            .iter()
            .position(|record| record.collection_name == collection)
        {
            Some(position) => position,
            None => {
                warn!(collection, "collection not found in record, adding new entry");
                records.push(self.new_record(collection));
                records.len() - 1
            }
        };

        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let record = &mut records[position];
        record.stamp(operation, now.clone());
        if operation == TrackOperation::Generation {
            record.main_package_version = self.versions.main_package.clone();
            record.framework_package_version = self.versions.framework_package.clone();
            record.apply_metadata(&self.file_metadata(collection));
        }
        if let Some(note) = notes.filter(|note| !note.is_empty()) {
            record.append_note(note);
        }
        let updated = record.clone();

        self.save(&records)?;
        info!(collection, operation = %operation, at = %now, "dataset record updated");
        Ok(updated)
    }

    /// Counts per lifecycle step. `None` when no ledger exists yet.
    pub fn status(&self) -> Result<Option<TrackerStatus>, StoreError> {
        if !self.layout.record_path().is_file() {
            return Ok(None);
        }
        let records = self.load()?;
        let mut status = TrackerStatus {
            total: records.len() as u64,
            ..TrackerStatus::default()
        };
        for record in &records {
            status.generated += u64::from(!record.last_generation_date.is_empty());
            status.dataset_verified += u64::from(!record.dataset_verification_date.is_empty());
            status.database_populated += u64::from(!record.database_population_date.is_empty());
            status.database_verified += u64::from(!record.database_verification_date.is_empty());
            *status.by_category.entry(record.category.clone()).or_insert(0) += 1;
        }
        Ok(Some(status))
    }

    pub fn load(&self) -> Result<Vec<DatasetRecord>, StoreError> {
        let path = self.layout.record_path();
        if !path.is_file() {
            return Err(StoreError::NotFound(path));
        }
        let mut reader = csv::Reader::from_path(&path)?;
        let mut records = Vec::new();
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(records)
    }

    fn save(&self, records: &[DatasetRecord]) -> Result<(), StoreError> {
        let path = self.layout.record_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&path)?;
        if records.is_empty() {
            writer.write_record(RECORD_FIELDS)?;
        }
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn new_record(&self, collection: &str) -> DatasetRecord {
        let (category, dataset_type) = self.categorise.categorise(collection);
        let notes = format!("Generated collection - {category}/{dataset_type}");
        DatasetRecord {
            collection_name: collection.to_string(),
            category,
            dataset_type,
            last_generation_date: String::new(),
            dataset_verification_date: String::new(),
            database_population_date: String::new(),
            database_verification_date: String::new(),
            main_package_version: String::new(),
            framework_package_version: String::new(),
            record_count: 0,
            csv_size_mb: 0.0,
            json_size_mb: 0.0,
            csv_file_path: self.layout.relative_csv(collection),
            json_file_path: self.layout.relative_json(collection),
            csv_exists: false,
            json_exists: false,
            notes,
        }
    }

    fn file_metadata(&self, collection: &str) -> FileMetadata {
        let csv_path = self.layout.csv_dir().join(format!("{collection}.csv"));
        let json_path = self.layout.json_dir().join(format!("{collection}.json"));
        let mut metadata = FileMetadata::default();

        if csv_path.is_file() {
            metadata.csv_exists = true;
            metadata.csv_size_mb = size_mb(&csv_path);
            match count_csv_records(&csv_path) {
                Ok(count) => metadata.record_count = count,
                Err(err) => warn!(path = %csv_path.display(), error = %err, "failed to count records"),
            }
        }
        if json_path.is_file() {
            metadata.json_exists = true;
            metadata.json_size_mb = size_mb(&json_path);
        }
        metadata
    }
}

const RECORD_FIELDS: [&str; 17] = [
    "collection_name",
    "category",
    "dataset_type",
    "last_generation_date",
    "dataset_verification_date",
    "database_population_date",
    "database_verification_date",
    "main_package_version",
    "framework_package_version",
    "record_count",
    "csv_size_mb",
    "json_size_mb",
    "csv_file_path",
    "json_file_path",
    "csv_exists",
    "json_exists",
    "notes",
];

fn count_csv_records(path: &Path) -> Result<u64, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut count = 0;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// File size in MiB rounded to two decimals; unreadable files count as 0.
fn size_mb(path: &Path) -> f64 {
    std::fs::metadata(path)
        .map(|meta| (meta.len() as f64 / BYTES_PER_MB * 100.0).round() / 100.0)
        .unwrap_or(0.0)
}
