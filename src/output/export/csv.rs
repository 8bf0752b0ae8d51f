//! CSV export of plans and worklists
//!
//! Both files open in Excel or pandas and can be handed back to the bench.
//!
//! # Features
//!
//! - **Plans**: one line per well, feasible or not, with the skip reason
//! - **Worklists**: one line per robot step
//! - **Metadata support**: optional `#` comment header with a timestamp
//! - **Customizable**: delimiter, precision, decimal separator
//!
//! # Example
//!
//! ```rust,ignore
//! use norm_rs::output::export::{CsvConfig, CsvExporter, CsvMetadata, Exporter};
//!
//! let metadata = CsvMetadata::from_protocol("normalizer").with_source("params.csv");
//! let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
//!
//! exporter.export_plans(&plan.rows, Path::new("plans.csv"))?;
//! exporter.export_worklist(&plan.worklist, Path::new("worklist.csv"))?;
//! ```
//!
//! **Output** (`plans.csv`):
//! ```text
//! # Protein Normalization Plan
//! # Generated: 2026-02-11T15:30:00+00:00
//! # Protocol: normalizer
//! #
//! row,sample,source,destination,status,sample_ul,diluent_ul,total_ul,target_ug_per_ul,target_ug,achieved_ug,reason
//! 1,lysate 1,rack1:A1,A1,planned,50.00,150.00,200.00,0.50,100.00,100.00,
//! 2,lysate 2,rack1:A2,B1,insufficient_sample,,,,,,,"insufficient sample: needs 2000.00 µL, …"
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::output::export::Exporter;
use crate::protocols::{RowOutcome, RowPlan};
use crate::worklist::{TransferStep, Worklist};

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("delimiter '{0}' is not a single ASCII character")]
    Delimiter(char),

    #[error("delimiter and decimal separator are both '{0}'")]
    AmbiguousSeparator(char),

    #[error("nothing to export: {0} is empty")]
    Empty(&'static str),
}

// =============================================================================
// Configuration Structures
// =============================================================================

/// Configuration for CSV export
///
/// # Example
///
/// ```rust
/// use norm_rs::output::export::CsvConfig;
///
/// let config = CsvConfig::european().precision(1);
/// assert_eq!(config.delimiter, ';');
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Decimal places for volumes and concentrations (default: 2)
    pub precision: usize,

    /// Include metadata header comments (default: false)
    pub include_metadata: bool,

    pub metadata: Option<CsvMetadata>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 2,
            include_metadata: false,
            metadata: None,
        }
    }
}

impl CsvConfig {
    /// Semicolon-separated, comma decimal separator
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    /// Builder pattern: set delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder pattern: set precision
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Builder pattern: enable metadata
    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.include_metadata = true;
        self.metadata = Some(metadata);
        self
    }

    fn delimiter_byte(&self) -> Result<u8, CsvError> {
        if !self.delimiter.is_ascii() {
            return Err(CsvError::Delimiter(self.delimiter));
        }
        if self.delimiter == self.decimal_separator {
            return Err(CsvError::AmbiguousSeparator(self.delimiter));
        }
        Ok(self.delimiter as u8)
    }
}

/// Metadata for CSV header comments
///
/// Only the fields that are set appear in the header.
#[derive(Debug, Clone, Default)]
pub struct CsvMetadata {
    /// `normalizer` or `bca`
    pub protocol: Option<String>,

    /// Parameter file the run was planned from
    pub source: Option<String>,

    /// Additional custom parameters
    pub custom: Vec<(String, String)>,
}

impl CsvMetadata {
    pub fn from_protocol(protocol: &str) -> Self {
        Self {
            protocol: Some(protocol.to_string()),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Add custom parameter
    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.push((key.into(), value.into()));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Write metadata header comments
fn write_metadata_header<W: Write>(writer: &mut W, title: &str, metadata: &CsvMetadata) -> io::Result<()> {
    writeln!(writer, "# {title}")?;

    let now = chrono::Utc::now();
    writeln!(writer, "# Generated: {}", now.to_rfc3339())?;

    if let Some(protocol) = &metadata.protocol {
        writeln!(writer, "# Protocol: {protocol}")?;
    }
    if let Some(source) = &metadata.source {
        writeln!(writer, "# Parameters: {source}")?;
    }
    for (key, value) in &metadata.custom {
        writeln!(writer, "# {key}: {value}")?;
    }

    writeln!(writer, "#")
}

/// Format number with configured precision and decimal separator
fn format_number(value: f64, config: &CsvConfig) -> String {
    let formatted = format!("{:.prec$}", value, prec = config.precision);

    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

fn optional_number(value: Option<f64>, config: &CsvConfig) -> String {
    value.map(|v| format_number(v, config)).unwrap_or_default()
}

// =============================================================================
// Exporter
// =============================================================================

/// CSV implementation of [`Exporter`]
#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    pub config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    /// Write the plan table to any writer
    pub fn write_plans<W: Write>(&self, rows: &[RowPlan], mut writer: W) -> Result<(), CsvError> {
        if rows.is_empty() {
            return Err(CsvError::Empty("plan"));
        }
        let delimiter = self.config.delimiter_byte()?;
        self.write_header(&mut writer, "Protein Normalization Plan")?;

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        csv_writer.write_record([
            "row",
            "sample",
            "source",
            "destination",
            "status",
            "sample_ul",
            "diluent_ul",
            "total_ul",
            "target_ug_per_ul",
            "target_ug",
            "achieved_ug",
            "reason",
        ])?;

        let cfg = &self.config;
        for row in rows {
            let volumes = row.outcome.volumes();
            let plan = match &row.outcome {
                RowOutcome::Calculated(plan) => Some(plan),
                _ => None,
            };

            csv_writer.write_record([
                row.row.to_string(),
                row.name.clone(),
                row.source.to_string(),
                row.destination.to_string(),
                row.outcome.status().to_string(),
                optional_number(volumes.map(|(s, _)| s), cfg),
                optional_number(volumes.map(|(_, d)| d), cfg),
                optional_number(volumes.map(|(s, d)| s + d), cfg),
                optional_number(plan.map(|p| p.target_concentration), cfg),
                optional_number(plan.map(|p| p.target_quantity), cfg),
                optional_number(plan.map(|p| p.achieved_quantity), cfg),
                row.outcome.reason().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write the worklist table to any writer
    pub fn write_worklist<W: Write>(&self, worklist: &Worklist, mut writer: W) -> Result<(), CsvError> {
        if worklist.is_empty() {
            return Err(CsvError::Empty("worklist"));
        }
        let delimiter = self.config.delimiter_byte()?;
        self.write_header(&mut writer, "Liquid Handling Worklist")?;

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        csv_writer.write_record([
            "step",
            "action",
            "pipette",
            "volume_ul",
            "source",
            "destination",
            "aspirate_height_mm",
            "mix_reps",
            "mix_ul",
            "delay_s",
            "new_tip",
            "message",
        ])?;

        let cfg = &self.config;
        for (i, step) in worklist.steps().iter().enumerate() {
            let record: [String; 12] = match step {
                TransferStep::Transfer(t) => [
                    (i + 1).to_string(),
                    "transfer".to_string(),
                    t.pipette.load_name().to_string(),
                    format_number(t.volume, cfg),
                    t.source.to_string(),
                    t.destination.to_string(),
                    format_number(t.aspirate_height, cfg),
                    t.mix.map(|m| m.repetitions.to_string()).unwrap_or_default(),
                    optional_number(t.mix.map(|m| m.volume), cfg),
                    format_number(t.delay_secs, cfg),
                    t.new_tip.to_string(),
                    String::new(),
                ],
                TransferStep::Pause { message } => {
                    let mut record: [String; 12] = Default::default();
                    record[0] = (i + 1).to_string();
                    record[1] = "pause".to_string();
                    record[11] = message.clone();
                    record
                }
                TransferStep::Home => {
                    let mut record: [String; 12] = Default::default();
                    record[0] = (i + 1).to_string();
                    record[1] = "home".to_string();
                    record
                }
            };
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W, title: &str) -> io::Result<()> {
        if self.config.include_metadata {
            if let Some(metadata) = &self.config.metadata {
                write_metadata_header(writer, title, metadata)?;
            }
        }
        Ok(())
    }
}

impl Exporter for CsvExporter {
    type Error = CsvError;

    fn export_plans(&self, rows: &[RowPlan], path: &Path) -> Result<(), Self::Error> {
        let file = BufWriter::new(File::create(path)?);
        self.write_plans(rows, file)?;
        log::info!("wrote {} plan rows to {}", rows.len(), path.display());
        Ok(())
    }

    fn export_worklist(&self, worklist: &Worklist, path: &Path) -> Result<(), Self::Error> {
        let file = BufWriter::new(File::create(path)?);
        self.write_worklist(worklist, file)?;
        log::info!("wrote {} worklist steps to {}", worklist.len(), path.display());
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
