//! Export of protocol plans and worklists.
//!
//! # Architecture
//!
//! The [`Exporter`] trait abstracts the file format. Each format lives in its
//! own sub-module and brings its own error type.
//!
//! # Available formats
//!
//! | Format  | Module          |
//! |---------|-----------------|
//! | CSV     | [`csv`]         |
//!
//! # Usage example
//!
//! ```rust,ignore
//! use norm_rs::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//! exporter.export_plans(&plan.rows, Path::new("plans.csv"))?;
//! exporter.export_worklist(&plan.worklist, Path::new("worklist.csv"))?;
//! ```

pub mod csv;

pub use self::csv::{CsvConfig, CsvError, CsvExporter, CsvMetadata};

use std::path::Path;

use crate::protocols::RowPlan;
use crate::worklist::Worklist;

/// Abstraction trait for all export formats.
///
/// # Associated type `Error`
///
/// Each format manages its own errors via the associated type, so callers
/// can match on them without downcasting a `Box<dyn Error>`.
pub trait Exporter {
    type Error: std::error::Error;

    /// Every row of a plan, skipped rows included
    fn export_plans(&self, rows: &[RowPlan], path: &Path) -> Result<(), Self::Error>;

    /// The steps of a worklist, in execution order
    fn export_worklist(&self, worklist: &Worklist, path: &Path) -> Result<(), Self::Error>;
}
