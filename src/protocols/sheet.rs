//! Sample sheets
//!
//! One row per destination well. Headers are the ones the bench sheets have
//! always used (`sample name`, `aspirate tray`, …); extra columns are
//! ignored and every field is trimmed.
//!
//! Numeric columns are kept as text here and parsed per row, so one bad cell
//! is reported against its row instead of failing the whole file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{NormError, NormResult};

/// Row of a normalizer sheet
///
/// Either `concentration` + `available volume` (volumes are computed) or
/// `sample volume` + `diluent volume` (volumes are given).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizerRow {
    #[serde(rename = "sample name")]
    pub sample_name: String,

    #[serde(rename = "aspirate tray", default)]
    pub aspirate_tray: String,

    #[serde(rename = "aspirate location")]
    pub aspirate_location: String,

    #[serde(rename = "dispense location")]
    pub dispense_location: String,

    #[serde(default)]
    pub concentration: Option<String>,

    #[serde(rename = "available volume", default)]
    pub available_volume: Option<String>,

    #[serde(rename = "sample volume", default)]
    pub sample_volume: Option<String>,

    #[serde(rename = "diluent volume", default)]
    pub diluent_volume: Option<String>,
}

/// Row of a BCA sheet
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BcaRow {
    #[serde(rename = "sample name")]
    pub sample_name: String,

    #[serde(rename = "aspirate tray", default)]
    pub aspirate_tray: String,

    #[serde(rename = "aspirate location")]
    pub aspirate_location: String,

    pub dilution: String,

    #[serde(rename = "dispense location")]
    pub dispense_location: String,

    /// Known stock concentration (µg/µL), only used to label the plan
    #[serde(default)]
    pub concentration: Option<String>,
}

/// Read every row of a sheet
///
/// # Errors
///
/// A missing required column or an unreadable row; an empty sheet is a
/// [`NormError::Layout`] error.
pub fn read_sheet<T: DeserializeOwned, R: Read>(mut reader: R) -> NormResult<Vec<T>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let text = text.trim_start_matches('\u{feff}');

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()?;

    if rows.is_empty() {
        return Err(NormError::Layout("sample sheet has no rows".to_string()));
    }
    Ok(rows)
}

pub fn read_sheet_from_path<T: DeserializeOwned>(path: impl AsRef<Path>) -> NormResult<Vec<T>> {
    let path = path.as_ref();
    log::info!("reading sample sheet {}", path.display());
    read_sheet(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_sheet_both_modes() {
        let text = "sample name, aspirate tray ,aspirate location,dispense location,concentration,available volume,sample volume,diluent volume,notes\n\
                    lysate 1,1,a1,A1,4.0,200,,,\n\
                    lysate 2,1,A2,B1,,,25,175,rerun\n";
        let rows: Vec<NormalizerRow> = read_sheet(text.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].aspirate_tray, "1");
        assert_eq!(rows[0].concentration.as_deref(), Some("4.0"));
        assert_eq!(rows[0].sample_volume, None);
        assert_eq!(rows[1].concentration, None);
        assert_eq!(rows[1].diluent_volume.as_deref(), Some("175"));
    }

    #[test]
    fn test_optional_columns_may_be_absent() {
        let text = "sample name,aspirate tray,aspirate location,dispense location,sample volume,diluent volume\n\
                    s1,0,A1,A1,10,90\n";
        let rows: Vec<NormalizerRow> = read_sheet(text.as_bytes()).unwrap();
        assert_eq!(rows[0].available_volume, None);
        assert_eq!(rows[0].sample_volume.as_deref(), Some("10"));
    }

    #[test]
    fn test_bca_sheet() {
        let text = "sample name,aspirate tray,aspirate location,dilution,dispense location\n\
                    s1,1,B2,10,C3\n";
        let rows: Vec<BcaRow> = read_sheet(text.as_bytes()).unwrap();
        assert_eq!(rows[0].dilution, "10");
        assert_eq!(rows[0].concentration, None);
    }

    #[test]
    fn test_missing_required_column() {
        let text = "sample name,aspirate tray,aspirate location\ns1,1,A1\n";
        let err = read_sheet::<NormalizerRow, _>(text.as_bytes()).unwrap_err();
        assert!(matches!(err, NormError::Csv(_)));
    }

    #[test]
    fn test_empty_sheet() {
        let text = "sample name,aspirate tray,aspirate location,dilution,dispense location\n";
        let err = read_sheet::<BcaRow, _>(text.as_bytes()).unwrap_err();
        assert!(matches!(err, NormError::Layout(_)));
    }
}
