use std::fs;
use std::path::PathBuf;

use sbdb_core::{Table, read_csv, read_table_csv, write_table_csv, write_table_json_records};
use serde_json::{Value, json};

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("sbdb_core_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}

fn bolt_table() -> Table {
    Table::with_rows(
        ["name", "d_f", "phiV_f", "threads_included", "detail"],
        vec![
            vec![json!("M16 8.8/S"), json!(16), json!(59.3), json!(true), json!({"cat": "8.8/S"})],
            vec![json!("M20 8.8/S"), json!(20), json!(92.6), json!(false), Value::Null],
        ],
    )
    .expect("build table")
}

#[test]
fn csv_export_reads_back_with_inferred_types() {
    let dir = temp_out_dir("csv");
    let path = dir.join("bolts.csv");
    let table = bolt_table();

    let bytes = write_table_csv(&path, &table).expect("write csv");
    assert_eq!(bytes, fs::metadata(&path).expect("metadata").len());

    let loaded = read_table_csv(&path, 0).expect("read csv");
    assert_eq!(loaded.columns(), table.columns());
    assert_eq!(loaded.cell(0, "d_f"), Some(&json!(16)));
    assert_eq!(loaded.cell(0, "phiV_f"), Some(&json!(59.3)));
    assert_eq!(loaded.cell(1, "threads_included"), Some(&json!(false)));
    assert_eq!(loaded.cell(1, "detail"), Some(&Value::Null));
    assert_eq!(loaded.cell(0, "detail"), Some(&json!("{\"cat\":\"8.8/S\"}")));
}

#[test]
fn read_csv_skips_unit_rows() {
    let data = "name,d_f,phiV_f\n-,mm,kN\nM16,16,59.3\nM20,20,92.6\n";
    let table = read_csv(data.as_bytes(), 1).expect("read csv");
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(0, "name"), Some(&json!("M16")));
}

#[test]
fn json_records_keep_column_names_and_types() {
    let dir = temp_out_dir("json");
    let path = dir.join("bolts.json");
    write_table_json_records(&path, &bolt_table()).expect("write json");

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read json")).expect("parse json");
    let records = parsed.as_array().expect("array of records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["d_f"], json!(16));
    assert_eq!(records[0]["detail"], json!({"cat": "8.8/S"}));
    assert_eq!(records[1]["threads_included"], json!(false));
}
