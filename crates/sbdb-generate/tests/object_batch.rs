use std::cell::RefCell;
use std::fmt;

use sbdb_generate::{
    AttributeAccess, BatchError, BatchItem, BatchProgress, ItemError, ObjectBatch, ProgressSink,
    VariableSpace,
};
use sbdb_core::Params;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
struct Plate {
    name: String,
    width: f64,
    thickness: f64,
    area: f64,
}

#[derive(Debug)]
struct PlateError(String);

impl fmt::Display for PlateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AttributeAccess for Plate {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(json!(self.name)),
            "width" => Some(json!(self.width)),
            "thickness" => Some(json!(self.thickness)),
            "area" => Some(json!(self.area)),
            _ => None,
        }
    }

    fn declared_attributes() -> Vec<String> {
        vec!["name".to_string(), "area".to_string()]
    }
}

fn build_plate(params: &Params) -> Result<Plate, PlateError> {
    let width = params
        .get("width")
        .and_then(Value::as_f64)
        .ok_or_else(|| PlateError("width must be numeric".to_string()))?;
    let thickness = params
        .get("thickness")
        .and_then(Value::as_f64)
        .ok_or_else(|| PlateError("thickness must be numeric".to_string()))?;
    if thickness <= 0.0 {
        return Err(PlateError(format!("thickness {thickness} must be positive")));
    }
    Ok(Plate {
        name: format!("PL{width}x{thickness}"),
        width,
        thickness,
        area: width * thickness,
    })
}

fn plate_space() -> VariableSpace {
    VariableSpace::from_json_value(json!({
        "width": [100, 150, 200],
        "thickness": [0, 10, 12]
    }))
    .expect("plate space")
}

#[test]
fn instances_stay_aligned_with_combinations() {
    let space = plate_space();
    let batch = ObjectBatch::new(
        build_plate,
        space.enumerate().to_vec(),
        ["name", "width", "thickness", "area"],
    )
    .expect("batch");
    let output = batch.run(None);

    assert_eq!(output.instances().len(), space.len());
    assert_eq!(output.skipped_indices(), vec![0, 3, 6]);
    assert_eq!(output.table().len(), 6);

    for (row, (index, plate)) in output.successes().enumerate() {
        assert_eq!(output.row_origin(row), Some(index));
        let record = output.table().record(row).expect("row");
        for attr in ["name", "width", "thickness", "area"] {
            assert_eq!(Some(record[attr].clone()), plate.attribute(attr));
        }
    }
}

#[test]
fn always_failing_constructor_yields_empty_table() {
    let space = plate_space();
    let batch = ObjectBatch::new(
        |_: &Params| -> Result<Plate, PlateError> { Err(PlateError("unsupported".to_string())) },
        space.enumerate().to_vec(),
        ["name"],
    )
    .expect("batch");
    let output = batch.run(None);

    assert!(output.table().is_empty());
    assert_eq!(output.table().columns(), ["name"]);
    assert_eq!(output.failures().count(), space.len());
    assert_eq!(output.report().failed, space.len() as u64);
    assert_eq!(output.report().succeeded, 0);
}

#[test]
fn failures_match_predicate_exactly() {
    let space = VariableSpace::from_json_value(json!({"a": [1, 2], "b": ["x", "y"]}))
        .expect("space");
    let batch = ObjectBatch::new(
        |params: &Params| -> Result<Params, String> {
            if params["a"] == json!(2) {
                Err("a == 2 not supported".to_string())
            } else {
                Ok(params.clone())
            }
        },
        space.enumerate().to_vec(),
        ["a", "b"],
    )
    .expect("batch");
    let output = batch.run(None);

    assert_eq!(output.skipped_indices(), vec![2, 3]);
    assert_eq!(output.table().len(), 2);
    assert_eq!(output.table().cell(0, "b"), Some(&json!("x")));
    assert_eq!(output.table().cell(1, "b"), Some(&json!("y")));

    let failure = output.failures().next().expect("failure");
    assert_eq!(failure.params["a"], json!(2));
    assert_eq!(
        failure.error,
        ItemError::Construction {
            message: "a == 2 not supported".to_string()
        }
    );
}

#[test]
fn missing_attribute_fails_only_that_row() {
    let space = plate_space();
    let batch = ObjectBatch::new(
        build_plate,
        space.enumerate().to_vec(),
        ["name", "mass"],
    )
    .expect("batch");
    let output = batch.run(None);

    assert!(output.table().is_empty());
    let stages: Vec<&str> = output
        .failures()
        .map(|failure| failure.error.stage())
        .collect();
    assert_eq!(stages.iter().filter(|stage| **stage == "attribute_projection").count(), 6);
    assert_eq!(stages.iter().filter(|stage| **stage == "construction").count(), 3);
    assert_eq!(output.report().failures_by_stage["attribute_projection"], 6);
}

#[test]
fn panicking_constructor_is_contained() {
    let combinations = VariableSpace::from_json_value(json!({"n": [1, 2, 3]}))
        .expect("space")
        .into_combinations();
    let batch = ObjectBatch::new(
        |params: &Params| -> Result<Params, String> {
            if params["n"] == json!(2) {
                panic!("boom at two");
            }
            Ok(params.clone())
        },
        combinations,
        ["n"],
    )
    .expect("batch");
    let output = batch.run(None);

    assert_eq!(output.table().len(), 2);
    match &output.instances()[1] {
        BatchItem::Failed(failure) => assert_eq!(
            failure.error,
            ItemError::Panicked {
                message: "boom at two".to_string()
            }
        ),
        BatchItem::Built(_) => panic!("expected failure at index 1"),
    }
}

#[test]
fn progress_is_reported_after_every_item() {
    let space = plate_space();
    let batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name"])
        .expect("batch");

    let seen = RefCell::new(Vec::new());
    let mut sink = |progress: BatchProgress| seen.borrow_mut().push(progress);
    let output = batch.run(Some(&mut sink));

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 9);
    assert_eq!(seen[0], BatchProgress { processed: 1, failed: 1, total: 9 });
    assert_eq!(seen[8], BatchProgress { processed: 9, failed: 3, total: 9 });
    assert!(seen[8].is_complete());
    assert_eq!(output.table().len(), 6);
}

#[test]
fn panicking_progress_sink_cannot_alter_outcome() {
    struct Exploding;
    impl ProgressSink for Exploding {
        fn record(&mut self, _progress: BatchProgress) {
            panic!("sink failure");
        }
    }

    let space = plate_space();
    let batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name"])
        .expect("batch");
    let output = batch.run(Some(&mut Exploding));
    assert_eq!(output.instances().len(), 9);
    assert_eq!(output.table().len(), 6);
}

#[test]
fn declared_attributes_are_used_by_default() {
    let space = plate_space();
    let batch = ObjectBatch::with_declared_attributes(build_plate, space.enumerate().to_vec())
        .expect("batch");
    assert_eq!(batch.report_attrs(), ["name", "area"]);
    let output = batch.run(None);
    assert_eq!(output.table().columns(), ["name", "area"]);
}

#[test]
fn duplicate_report_attributes_are_rejected() {
    let result = ObjectBatch::new(build_plate, Vec::new(), ["name", "name"]);
    assert!(result.is_err());
}

#[test]
fn name_dict_indexes_instances_by_column() {
    let space = plate_space();
    let batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name", "area"])
        .expect("batch");
    let output = batch.run(None);

    let by_name = output.make_name_dict("name").expect("name dict");
    assert_eq!(by_name.len(), 6);
    assert_eq!(by_name["PL150x12"].area, 1800.0);
    assert!(output.make_name_dict("mass").is_err());
}

#[test]
fn reduce_design_space_drops_matching_combinations() {
    let space = plate_space();
    let mut batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name", "area"])
        .expect("batch");
    let output = batch.run(None);

    let removed = batch
        .reduce_design_space(&output, |row| {
            row.get("area").and_then(Value::as_f64).is_some_and(|area| area > 1500.0)
        })
        .expect("reduce");
    // 150x12, 200x10, 200x12
    assert_eq!(removed, 3);
    assert_eq!(batch.combinations().len(), 6);

    let rerun = batch.run(None);
    assert_eq!(rerun.table().len(), 3);
    assert_eq!(rerun.skipped_indices(), vec![0, 3, 5]);
}

#[test]
fn reducing_twice_with_the_same_output_is_rejected() {
    let combinations = VariableSpace::from_json_value(json!({"n": [1, 2, 3, 4]}))
        .expect("space")
        .into_combinations();
    let mut batch = ObjectBatch::new(
        |params: &Params| -> Result<Params, String> { Ok(params.clone()) },
        combinations,
        ["n"],
    )
    .expect("batch");
    let output = batch.run(None);
    let is_one = |row: &Params| row["n"] == json!(1);

    assert_eq!(batch.reduce_design_space(&output, is_one).expect("reduce"), 1);
    let err = batch.reduce_design_space(&output, is_one).unwrap_err();
    assert!(matches!(err, BatchError::StaleOutput));

    let remaining: Vec<&Value> = batch.combinations().iter().map(|params| &params["n"]).collect();
    assert_eq!(remaining, [&json!(2), &json!(3), &json!(4)]);

    let rerun = batch.run(None);
    assert_eq!(batch.reduce_design_space(&rerun, is_one).expect("reduce"), 0);
    assert_eq!(batch.combinations().len(), 3);
}

#[test]
fn output_of_another_batch_is_rejected() {
    let space = plate_space();
    let other = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name", "area"])
        .expect("batch");
    let foreign = other.run(None);

    let mut batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name", "area"])
        .expect("batch");
    let err = batch.reduce_design_space(&foreign, |_| true).unwrap_err();
    assert!(matches!(err, BatchError::StaleOutput));
    assert_eq!(batch.combinations().len(), space.len());
}

#[test]
fn failure_records_are_built_on_request() {
    let space = plate_space();
    let batch = ObjectBatch::new(build_plate, space.enumerate().to_vec(), ["name"])
        .expect("batch");
    let output = batch.run(None);

    assert!(output.report().failures.is_empty());
    assert_eq!(output.report().failed, 3);

    let report = output.report_with_failures();
    let indices: Vec<usize> = report.failures.iter().map(|record| record.index).collect();
    assert_eq!(indices, [0, 3, 6]);
    assert_eq!(report.failures[0].stage, "construction");
    assert_eq!(report.failures[1].params["width"], json!(150));
}
