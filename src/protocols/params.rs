//! `variable,value` parameter files
//!
//! Protocol settings live in a two-column CSV that bench scientists edit in a
//! spreadsheet:
//!
//! ```text
//! variable,value
//! inputCSVfilename,lysates.csv
//! number_of_sample_racks,2
//! mix,yes
//! ```
//!
//! Keys and values are trimmed, a UTF-8 byte order mark (Excel) is ignored
//! and a repeated key keeps its last value.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::deck::{TubeSize, WellAddress};
use crate::error::{NormError, NormResult};

#[derive(Debug, Deserialize)]
struct ParameterRow {
    variable: String,
    #[serde(default)]
    value: String,
}

/// Parsed parameter file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    values: BTreeMap<String, String>,
}

impl ParameterTable {
    pub fn from_path(path: impl AsRef<Path>) -> NormResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> NormResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let text = text.trim_start_matches('\u{feff}');

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut values = BTreeMap::new();
        for row in csv_reader.deserialize() {
            let row: ParameterRow = row?;
            if row.variable.is_empty() {
                continue;
            }
            values.insert(row.variable, row.value);
        }

        log::debug!("read {} parameters", values.len());
        Ok(Self { values })
    }

    /// Set or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.optional_text(name).is_some()
    }

    /// Value of `name`, `None` when absent or empty
    pub fn optional_text(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, name: &str) -> NormResult<&str> {
        self.optional_text(name)
            .ok_or_else(|| NormError::MissingParameter(name.to_string()))
    }

    pub fn number(&self, name: &str) -> NormResult<f64> {
        let raw = self.text(name)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(NormError::invalid(name, format!("'{raw}' is not a number"))),
        }
    }

    pub fn number_or(&self, name: &str, default: f64) -> NormResult<f64> {
        if self.contains(name) {
            self.number(name)
        } else {
            Ok(default)
        }
    }

    /// Optional number, `None` when absent or empty
    pub fn optional_number(&self, name: &str) -> NormResult<Option<f64>> {
        if self.contains(name) {
            self.number(name).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn integer(&self, name: &str) -> NormResult<u32> {
        let raw = self.text(name)?;
        raw.parse::<u32>()
            .map_err(|_| NormError::invalid(name, format!("'{raw}' is not a non-negative integer")))
    }

    pub fn integer_or(&self, name: &str, default: u32) -> NormResult<u32> {
        if self.contains(name) {
            self.integer(name)
        } else {
            Ok(default)
        }
    }

    pub fn flag(&self, name: &str) -> NormResult<bool> {
        let raw = self.text(name)?;
        str_to_bool(raw).ok_or_else(|| NormError::invalid(name, format!("invalid truth value '{raw}'")))
    }

    pub fn flag_or(&self, name: &str, default: bool) -> NormResult<bool> {
        if self.contains(name) {
            self.flag(name)
        } else {
            Ok(default)
        }
    }

    pub fn tube_size(&self, name: &str) -> NormResult<TubeSize> {
        self.text(name)?
            .parse::<TubeSize>()
            .map_err(|e| match e {
                NormError::InvalidParameter { reason, .. } => NormError::invalid(name, reason),
                other => other,
            })
    }

    /// Tube position in the rack a tube of `size` is loaded in
    pub fn tube_location(&self, name: &str, size: TubeSize) -> NormResult<WellAddress> {
        WellAddress::parse(self.text(name)?, size.rack_format())
            .map_err(|e| NormError::invalid(name, e.to_string()))
    }
}

/// Spreadsheet truth values
///
/// ```rust
/// use norm_rs::protocols::str_to_bool;
///
/// assert_eq!(str_to_bool("Yup"), Some(true));
/// assert_eq!(str_to_bool("off"), Some(false));
/// assert_eq!(str_to_bool("maybe"), None);
/// ```
pub fn str_to_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" | "yup" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" | "nope" => Some(false),
        _ => None,
    }
}
