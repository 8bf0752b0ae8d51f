//! Output of protocol plans
//!
//! - **Export**: plan and worklist tables for the bench and for analysis
//! - **Summary**: a short report for the terminal
//!
//! # Architecture
//!
//! ```text
//! output/
//! ├── mod.rs              ← This file
//! ├── summary.rs          ← Terminal report
//! └── export/             ← Data export
//!     ├── mod.rs
//!     └── csv.rs
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use norm_rs::output::{CsvExporter, Exporter, PlanSummary};
//!
//! println!("{}", PlanSummary::new("normalizer", &plan));
//! CsvExporter::default().export_plans(&plan.rows, Path::new("plans.csv"))?;
//! ```

pub mod export;
pub mod summary;

pub use export::{CsvConfig, CsvError, CsvExporter, CsvMetadata, Exporter};
pub use summary::PlanSummary;
