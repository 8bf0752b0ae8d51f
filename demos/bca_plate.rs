//! Example: BCA Assay Plate
//!
//! Lays out six lysates at 1:1 to 1:25, a six-step BSA standard ladder and
//! two blanks from `demos/data/bca_params.csv`, then fits a standard curve to
//! made-up absorbances to back-calculate stock concentrations.

use std::path::PathBuf;

use norm_rs::calculator::StandardCurve;
use norm_rs::output::{CsvExporter, Exporter, PlanSummary};
use norm_rs::protocols::plan_bca_files;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("═══════════════════════════════════════════════════════");
    println!("  BCA Plate Layout");
    println!("═══════════════════════════════════════════════════════\n");

    let params = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/data/bca_params.csv");
    let plan = plan_bca_files(&params, None)?;

    for row in &plan.rows {
        let volumes = row
            .outcome
            .volumes()
            .map(|(s, d)| format!("{s:>5.1} + {d:>5.1} µL"))
            .unwrap_or_else(|| row.outcome.status().to_string());
        println!("{:>4}  {:<22} {}", row.destination.to_string(), row.name, volumes);
    }
    println!("\n{}", PlanSummary::new("bca", &plan));

    // ====== Standard curve ======

    // Absorbance at 562 nm, slightly saturating at the top of the ladder
    let standards: Vec<(f64, f64)> = [2.0, 1.5, 1.0, 0.75, 0.5, 0.25, 0.125, 0.025]
        .iter()
        .map(|&c| (c, 0.095 + 1.02 * c - 0.09 * c * c))
        .collect();
    let curve = StandardCurve::fit(&standards, 2)?;
    println!("\nStandard curve: R² = {:.4}", curve.r_squared());

    for (name, absorbance, dilution) in [("HEK293 ctrl", 0.52, 10.0), ("HeLa", 0.81, 5.0)] {
        let stock = curve.sample_concentration(absorbance, dilution)?;
        println!("  {name:<12} A562 {absorbance:.2} at 1:{dilution} → {stock:.2} µg/µL");
    }

    let out = std::env::temp_dir().join("bca_plate.csv");
    CsvExporter::default().export_plans(&plan.rows, &out)?;
    println!("\nPlate layout written to {}", out.display());

    Ok(())
}
