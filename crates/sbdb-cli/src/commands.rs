use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::{Value, json};
use uuid::Uuid;

use sbdb_core::{ARTIFACT_VERSION, write_csv};
use sbdb_eval::{VerificationEngine, write_artifacts};
use sbdb_generate::{LogProgress, ObjectBatch, VariableSpace, variable_set_json_schema};
use sbdb_store::{
    DatasetTracker, PackageVersions, TrackOperation, TrackerLayout, export_collection,
    import_csv_table,
};

use crate::config::SbdbConfig;
use crate::models::{ModelKind, SimpleBeam};
use crate::registry::{
    RunContext, RunPaths, init_logging, init_stderr_logging, start_run, write_bytes_atomic,
    write_json_atomic,
};
use crate::{
    CliError, EnumerateArgs, GenerateArgs, OutputFormat, SchemaArgs, TrackArgs, TrackCommand,
    VerifyArgs,
};

/// Create the run directory and route logs into it.
fn begin_run(
    command: &str,
    config: &SbdbConfig,
    run_dir: Option<PathBuf>,
    options: Value,
) -> Result<RunPaths, CliError> {
    let run_id = Uuid::new_v4().to_string();
    let ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: command.to_string(),
        run_dir: run_dir.unwrap_or_else(|| config.run.run_dir.clone()),
        options,
    };
    let paths = start_run(&ctx)?;
    init_logging(Some(&paths.logs_path))?;
    tracing::info!(event = "run_started", run_id = %run_id, command, run_root = %paths.root.display());
    Ok(paths)
}

fn tracker(base_dir: &Path) -> DatasetTracker {
    DatasetTracker::new(TrackerLayout::new(base_dir)).with_versions(PackageVersions {
        main_package: format!("sbdb {}", env!("CARGO_PKG_VERSION")),
        framework_package: format!("sbdb-artifacts {ARTIFACT_VERSION}"),
    })
}

pub(crate) fn run_enumerate(args: EnumerateArgs, config: &SbdbConfig) -> Result<(), CliError> {
    let timer = Instant::now();
    let space = VariableSpace::from_json_file(&args.vars)?;
    let options = json!({
        "vars": args.vars,
        "format": format!("{:?}", args.format).to_lowercase(),
        "space_fingerprint": space.fingerprint(),
    });
    let paths = begin_run("enumerate", config, args.run_dir, options)?;
    write_json_atomic(&paths.artifact("variable_set.json"), &space.to_json_value())?;

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_vec_pretty(space.enumerate())?,
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            write_csv(&mut buffer, &space.combinations_table())?;
            buffer
        }
    };

    match &args.out {
        Some(path) => {
            write_bytes_atomic(path, &rendered)?;
            tracing::info!(event = "combinations_written", path = %path.display(), combinations = space.len());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.write_all(b"\n")?;
        }
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

pub(crate) fn run_generate(args: GenerateArgs, config: &SbdbConfig) -> Result<(), CliError> {
    let timer = Instant::now();
    let space = VariableSpace::from_json_file(&args.vars)?;
    let fingerprint = space.fingerprint();
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| config.generate.out_dir.clone());
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| args.model.default_name().to_string());
    let progress_interval = args
        .progress_interval
        .unwrap_or(config.generate.progress_interval);

    let options = json!({
        "vars": args.vars,
        "model": args.model.default_name(),
        "attrs": args.attrs,
        "name": name,
        "out_dir": out_dir,
        "progress_interval": progress_interval,
        "space_fingerprint": fingerprint,
    });
    let paths = begin_run("generate", config, args.run_dir, options)?;

    let combinations = space.into_combinations();
    let batch = match args.model {
        ModelKind::SimpleBeam if args.attrs.is_empty() => {
            ObjectBatch::with_declared_attributes(SimpleBeam::from_params, combinations)?
        }
        ModelKind::SimpleBeam => {
            ObjectBatch::new(SimpleBeam::from_params, combinations, args.attrs.clone())?
        }
    };

    let mut progress = LogProgress::new(progress_interval);
    let output = batch.run(Some(&mut progress));
    let report = output.report_with_failures().with_fingerprint(fingerprint);
    write_json_atomic(&paths.artifact("generation_report.json"), &report)?;

    let layout = TrackerLayout::new(&out_dir);
    let exported = export_collection(output.table(), &name, &layout.csv_dir(), &layout.json_dir())?;
    tracing::info!(
        event = "collection_exported",
        collection = %exported.collection,
        csv = %exported.csv_path.display(),
        json = %exported.json_path.display()
    );

    if args.track {
        let note = format!(
            "{} of {} combinations built",
            report.succeeded, report.combinations
        );
        tracker(&out_dir).update(&exported.collection, TrackOperation::Generation, Some(&note))?;
    }

    println!(
        "{}: {} built, {} skipped -> {}",
        exported.collection,
        report.succeeded,
        report.failed,
        exported.csv_path.display()
    );
    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

pub(crate) fn run_verify(args: VerifyArgs, config: &SbdbConfig) -> Result<(), CliError> {
    let timer = Instant::now();
    let mut options = config.verify.clone();
    if let Some(tolerance) = args.tolerance {
        options.tolerance = tolerance;
    }
    if let Some(max_examples) = args.max_examples {
        options.max_examples = max_examples;
    }

    let run_options = json!({
        "generated": args.generated,
        "reference": args.reference,
        "key": args.key,
        "skip_rows": args.skip_rows,
        "strict": args.strict,
        "track": args.track,
        "base_dir": args.base_dir,
        "verify": options,
    });
    let paths = begin_run("verify", config, args.run_dir, run_options)?;

    let generated = import_csv_table(&args.generated, 0)?;
    let reference = import_csv_table(&args.reference, args.skip_rows)?;
    let verification =
        VerificationEngine::new(&generated, &reference, &args.key, options.clone()).compare()?;

    let out_dir = args.out_dir.unwrap_or_else(|| paths.root.clone());
    let artifacts = write_artifacts(&verification, &out_dir, options.max_examples)?;
    tracing::info!(event = "report_written", path = %artifacts.markdown_path.display());

    let summary = &verification.summary;
    if let Some(collection) = &args.track {
        let note = format!(
            "verified against {}: {} matched, {} exceeding",
            args.reference.display(),
            summary.matched,
            summary.cells_exceeding
        );
        let base_dir = args
            .base_dir
            .as_deref()
            .unwrap_or(config.generate.out_dir.as_path());
        tracker(base_dir).update(
            collection,
            TrackOperation::DatasetVerification,
            Some(&note),
        )?;
    }

    println!(
        "matched {} of {} generated rows ({} reference rows unmatched); {} cell(s) exceed tolerance -> {}",
        summary.matched,
        summary.generated_rows,
        summary.unmatched_reference,
        summary.cells_exceeding,
        artifacts.markdown_path.display()
    );

    let status = if summary.within_tolerance {
        "success"
    } else {
        "out_of_tolerance"
    };
    tracing::info!(
        event = "run_finished",
        status,
        duration_ms = timer.elapsed().as_millis() as u64
    );

    if args.strict && !summary.within_tolerance {
        return Err(CliError::VerificationFailed {
            exceeding: summary.cells_exceeding,
            type_mismatches: summary.type_mismatches,
        });
    }
    Ok(())
}

pub(crate) fn run_track(args: TrackArgs, config: &SbdbConfig) -> Result<(), CliError> {
    init_stderr_logging()?;
    let base_dir = args
        .base_dir
        .unwrap_or_else(|| config.generate.out_dir.clone());
    let tracker = tracker(&base_dir);

    match args.command {
        TrackCommand::Init => {
            let count = tracker.initialise()?;
            println!(
                "created {} with {count} collections",
                tracker.layout().record_path().display()
            );
        }
        TrackCommand::Status => match tracker.status()? {
            Some(status) => {
                println!("Total collections: {}", status.total);
                for (label, count) in [
                    ("Generated", status.generated),
                    ("Dataset verified", status.dataset_verified),
                    ("Database populated", status.database_populated),
                    ("Database verified", status.database_verified),
                ] {
                    println!("{label}: {count} ({:.1}%)", status.percent(count));
                }
                println!("By category:");
                for (category, count) in &status.by_category {
                    println!("  {category}: {count} collections");
                }
            }
            None => println!(
                "record file {} not found",
                tracker.layout().record_path().display()
            ),
        },
        TrackCommand::Update {
            collection,
            operation,
            notes,
        } => {
            let record = tracker.update(&collection, operation, notes.as_deref())?;
            println!("updated {} - {operation}", record.collection_name);
        }
    }
    Ok(())
}

pub(crate) fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = variable_set_json_schema();
    match args.out {
        Some(path) => write_json_atomic(&path, &schema)?,
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}
