//! Build a small bolt library from a variable set and print the table.
//!
//! Run with `cargo run -p sbdb-generate --example bolt_library`.

use std::io;

use sbdb_core::{Params, write_csv};
use sbdb_generate::{AttributeAccess, LogProgress, ObjectBatch, VariableSpace};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

struct Bolt {
    name: String,
    d_f: f64,
    d_h: f64,
    phi_v_f: f64,
}

impl AttributeAccess for Bolt {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(json!(self.name)),
            "d_f" => Some(json!(self.d_f)),
            "d_h" => Some(json!(self.d_h)),
            "phiV_f" => Some(json!(self.phi_v_f)),
            _ => None,
        }
    }

    fn declared_attributes() -> Vec<String> {
        ["name", "d_f", "d_h", "phiV_f"]
            .iter()
            .map(|attr| attr.to_string())
            .collect()
    }
}

fn build_bolt(params: &Params) -> Result<Bolt, String> {
    let designation = params
        .get("bolt_des")
        .and_then(Value::as_str)
        .ok_or("bolt_des must be a string")?;
    let category = params
        .get("bolt_cat")
        .and_then(Value::as_str)
        .ok_or("bolt_cat must be a string")?;

    let d_f: f64 = designation
        .trim_start_matches('M')
        .parse()
        .map_err(|_| format!("unknown designation {designation}"))?;
    let f_uf = match category {
        "4.6/S" => 400.0,
        "8.8/S" | "8.8/TB" | "8.8/TF" => 830.0,
        other => return Err(format!("unsupported category {other}")),
    };

    let shank_area = std::f64::consts::PI * d_f * d_f / 4.0;
    Ok(Bolt {
        name: format!("{designation} {category}"),
        d_f,
        d_h: d_f + 2.0,
        phi_v_f: 0.8 * 0.62 * f_uf * shank_area / 1000.0,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let space = VariableSpace::from_json_value(json!({
        "bolt_des": ["M16", "M20", "M24"],
        "bolt_cat": ["4.6/S", "8.8/S", "10.9/S"]
    }))?;

    let batch = ObjectBatch::with_declared_attributes(build_bolt, space.enumerate().to_vec())?;
    let mut progress = LogProgress::new(3);
    let output = batch.run(Some(&mut progress));

    for failure in output.failures() {
        eprintln!("skipped #{}: {}", failure.index, failure.error);
    }
    write_csv(io::stdout().lock(), output.table())?;
    Ok(())
}
