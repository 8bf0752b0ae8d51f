//! Example: Normalizing Cell Lysates Before Reduction and Alkylation
//!
//! Plans a normalizer run from `demos/data/normalizer_params.csv`:
//!
//! - Target: 50 µg in 100 µL (0.5 µg/µL) per well
//! - TCEP before the samples, IAM after the heating pause
//! - One reference lysate drawn from the `CNTL1` tube
//!
//! Two samples are expected to be skipped: one too dilute for the volume
//! left in its tube, one so concentrated it would need less than 1 µL.

use std::path::PathBuf;

use norm_rs::output::{CsvConfig, CsvExporter, CsvMetadata, Exporter, PlanSummary};
use norm_rs::protocols::{plan_normalizer_files, RowOutcome};
use norm_rs::worklist::{run, RecordingExecutor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("═══════════════════════════════════════════════════════");
    println!("  Lysate Normalization - 50 µg in 100 µL");
    println!("═══════════════════════════════════════════════════════\n");

    let params = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/data/normalizer_params.csv");
    let plan = plan_normalizer_files(&params, None)?;

    // ====== Per-well volumes ======

    println!("{:<14} {:>5} {:>10} {:>10}  status", "sample", "well", "sample µL", "diluent µL");
    for row in &plan.rows {
        match &row.outcome {
            RowOutcome::Calculated(p) => println!(
                "{:<14} {:>5} {:>10.1} {:>10.1}  {:.2}% off target",
                row.name,
                row.destination.to_string(),
                p.sample_volume,
                p.diluent_volume,
                p.relative_quantity_error() * 100.0
            ),
            other => println!(
                "{:<14} {:>5} {:>10} {:>10}  {}",
                row.name,
                row.destination.to_string(),
                "-",
                "-",
                other.status()
            ),
        }
    }

    // ====== Dry run ======

    let mut executor = RecordingExecutor::default();
    let steps = run(&plan.worklist, &mut executor)?;
    println!("\nDry run: {steps} steps recorded\n");
    println!("{}", PlanSummary::new("normalizer", &plan));

    // ====== Export ======

    let out_dir = std::env::temp_dir();
    let exporter = CsvExporter::new(
        CsvConfig::default().precision(1).with_metadata(CsvMetadata::from_protocol("normalizer")),
    );
    exporter.export_plans(&plan.rows, &out_dir.join("normalizer_plans.csv"))?;
    exporter.export_worklist(&plan.worklist, &out_dir.join("normalizer_worklist.csv"))?;
    println!("\nTables written to {}", out_dir.display());

    Ok(())
}
