use std::fs;
use std::path::PathBuf;

use sbdb_core::Table;
use sbdb_store::{
    DatasetTracker, JsonDirSink, MemorySink, PackageVersions, RecordSink, StoreError,
    TrackOperation, TrackerLayout, export_collection, import_csv_table, populate_collections,
};
use serde_json::{Value, json};
use uuid::Uuid;

fn temp_base(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("sbdb_store_{label}_{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn beam_table() -> Table {
    Table::with_rows(
        ["name", "length", "mass"],
        vec![
            vec![json!("B1"), json!(1000), json!(7.85)],
            vec![json!("B2"), json!(2000), json!(15.7)],
            vec![json!("B3"), json!(3000), json!(23.55)],
        ],
    )
    .expect("table")
}

#[test]
fn export_then_import_keeps_rows() {
    let base = temp_base("export");
    let layout = TrackerLayout::new(&base);
    let exported =
        export_collection(&beam_table(), "beams", &layout.csv_dir(), &layout.json_dir())
            .expect("export");

    assert_eq!(exported.collection, "beams_collection");
    assert_eq!(exported.records, 3);
    assert!(exported.csv_path.ends_with("beams_collection.csv"));

    let imported = import_csv_table(&exported.csv_path, 0).expect("import");
    assert_eq!(imported, beam_table());

    let json: Value =
        serde_json::from_slice(&fs::read(&exported.json_path).expect("read json")).expect("json");
    assert_eq!(json[1], json!({"name": "B2", "length": 2000, "mass": 15.7}));

    fs::remove_dir_all(&base).ok();
}

#[test]
fn import_of_missing_file_is_not_found() {
    let path = std::env::temp_dir().join(format!("sbdb_missing_{}.csv", Uuid::new_v4()));
    let err = import_csv_table(&path, 0).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(missing) if missing == path));
}

#[test]
fn json_dir_sink_writes_record_arrays() {
    let base = temp_base("sink");
    let mut sink = JsonDirSink::new(base.join("db"));
    let written = sink.write_collection("beams", &beam_table()).expect("write");
    assert_eq!(written, 3);

    let json: Value = serde_json::from_slice(
        &fs::read(sink.collection_path("beams")).expect("read collection"),
    )
    .expect("json");
    assert_eq!(json.as_array().map(Vec::len), Some(3));
    assert!(sink.write_collection("../escape", &beam_table()).is_err());

    fs::remove_dir_all(&base).ok();
}

#[test]
fn populate_loads_listed_files_and_skips_missing() {
    let base = temp_base("populate");
    let layout = TrackerLayout::new(&base);
    export_collection(&beam_table(), "beams", &layout.csv_dir(), &layout.json_dir())
        .expect("export");

    let mut sink = MemorySink::new();
    let population = vec![
        ("steel_beams".to_string(), "beams_collection".to_string()),
        ("bolts".to_string(), "bolts_collection".to_string()),
    ];
    let outcomes =
        populate_collections(&layout.json_dir(), &population, &mut sink).expect("populate");

    assert_eq!(outcomes[0].inserted, Some(3));
    assert_eq!(outcomes[1].inserted, None);
    assert_eq!(sink.collection("steel_beams").map(<[_]>::len), Some(3));
    assert!(sink.collection("bolts").is_none());

    fs::remove_dir_all(&base).ok();
}

#[test]
fn tracker_lifecycle() {
    let base = temp_base("tracker");
    let layout = TrackerLayout::new(&base);
    export_collection(&beam_table(), "beams", &layout.csv_dir(), &layout.json_dir())
        .expect("export");
    export_collection(&beam_table(), "plates", &layout.csv_dir(), &layout.json_dir())
        .expect("export");

    let tracker = DatasetTracker::new(layout.clone())
        .with_versions(PackageVersions {
            main_package: "0.1.0".to_string(),
            framework_package: "0.1".to_string(),
        })
        .with_categorise(|name: &str| {
            if name.starts_with("beams") {
                ("steel".to_string(), "members".to_string())
            } else {
                ("general".to_string(), "dataset".to_string())
            }
        });

    assert!(tracker.status().expect("status").is_none());
    assert_eq!(tracker.initialise().expect("initialise"), 2);

    let records = tracker.load().expect("load");
    assert_eq!(records[0].collection_name, "plates_collection");
    assert_eq!(records[1].category, "steel");
    assert_eq!(records[1].record_count, 3);
    assert!(records[1].csv_exists && records[1].json_exists);
    assert!(records[1].last_generation_date.is_empty());

    let updated = tracker
        .update("beams_collection", TrackOperation::Generation, Some("rerun"))
        .expect("update");
    assert_eq!(updated.last_generation_date.len(), "2026-01-01 00:00:00".len());
    assert_eq!(updated.main_package_version, "0.1.0");
    assert_eq!(updated.notes, "Generated collection - steel/members; rerun");

    let added = tracker
        .update("bolts_collection", TrackOperation::DatasetVerification, None)
        .expect("update new");
    assert!(!added.csv_exists);
    assert!(!added.dataset_verification_date.is_empty());

    let status = tracker.status().expect("status").expect("ledger exists");
    assert_eq!(status.total, 3);
    assert_eq!(status.generated, 1);
    assert_eq!(status.dataset_verified, 1);
    assert_eq!(status.database_populated, 0);
    assert_eq!(status.by_category["general"], 2);
    assert_eq!(status.by_category["steel"], 1);

    fs::remove_dir_all(&base).ok();
}

#[test]
fn update_without_ledger_initialises_first() {
    let base = temp_base("tracker_fresh");
    let tracker = DatasetTracker::new(TrackerLayout::new(&base));
    let record = tracker
        .update("columns_collection", TrackOperation::DatabasePopulation, Some("first load"))
        .expect("update");
    assert!(!record.database_population_date.is_empty());
    assert_eq!(tracker.load().expect("load").len(), 1);

    fs::remove_dir_all(&base).ok();
}
