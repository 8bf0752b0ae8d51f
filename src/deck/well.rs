//! Well addresses and source positions
//!
//! Sheets are typed by hand, so addresses arrive as `a1`, `A01`, ` b12 `…
//! [`WellAddress::parse`] normalises all of them to `A1`-style addresses and
//! checks them against the labware format they refer to.

use std::fmt;

use crate::error::{NormError, NormResult};

// =================================================================================================
// Labware formats
// =================================================================================================

/// Grid geometry of a piece of labware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabwareFormat {
    /// 96-well plate, rows A–H, columns 1–12
    Plate96,
    /// 24-tube rack, rows A–D, columns 1–6
    TubeRack24,
    /// 15/50 ml Falcon rack, rows A–C, columns 1–4
    FalconRack,
}

impl LabwareFormat {
    pub fn rows(&self) -> u8 {
        match self {
            Self::Plate96 => 8,
            Self::TubeRack24 => 4,
            Self::FalconRack => 3,
        }
    }

    pub fn columns(&self) -> u8 {
        match self {
            Self::Plate96 => 12,
            Self::TubeRack24 => 6,
            Self::FalconRack => 4,
        }
    }

    /// Number of positions
    pub fn capacity(&self) -> usize {
        self.rows() as usize * self.columns() as usize
    }
}

// =================================================================================================
// Well Address
// =================================================================================================

/// Row/column address of a well or tube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WellAddress {
    /// Zero-based row (A = 0)
    row: u8,
    /// One-based column
    column: u8,
}

impl WellAddress {
    /// Parse and validate an address
    ///
    /// ```rust
    /// use norm_rs::deck::{LabwareFormat, WellAddress};
    ///
    /// let well = WellAddress::parse(" b03 ", LabwareFormat::Plate96).unwrap();
    /// assert_eq!(well.to_string(), "B3");
    ///
    /// // column 7 does not exist on a 24-tube rack
    /// assert!(WellAddress::parse("A7", LabwareFormat::TubeRack24).is_err());
    /// ```
    pub fn parse(raw: &str, format: LabwareFormat) -> NormResult<Self> {
        let text = raw.trim().to_ascii_uppercase();
        let mut chars = text.chars();

        let row_char = chars
            .next()
            .ok_or_else(|| NormError::Layout("empty well address".to_string()))?;
        let digits = chars.as_str();

        if !row_char.is_ascii_uppercase() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NormError::Layout(format!("'{}' is not a well address", raw.trim())));
        }

        let row = row_char as u8 - b'A';
        let column: u8 = digits
            .parse()
            .map_err(|_| NormError::Layout(format!("'{}' is not a well address", raw.trim())))?;

        if row >= format.rows() || column == 0 || column > format.columns() {
            return Err(NormError::Layout(format!(
                "'{}' does not exist on a {:?} ({} rows x {} columns)",
                text,
                format,
                format.rows(),
                format.columns()
            )));
        }

        Ok(Self { row, column })
    }

    /// Address from zero-based row and one-based column, unchecked against labware
    pub fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    /// Column-major index (A1 = 0, B1 = 1, …), the order the OT-2 fills plates in
    pub fn index(&self, format: LabwareFormat) -> usize {
        (self.column as usize - 1) * format.rows() as usize + self.row as usize
    }
}

impl fmt::Display for WellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.column)
    }
}

// =================================================================================================
// Source positions
// =================================================================================================

/// Where a sheet row aspirates its sample from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourcePosition {
    /// Tube in eppendorf rack `tray` (1–4)
    Rack { tray: u8, well: WellAddress },

    /// Well of the lysate plate (tray 0)
    Plate { well: WellAddress },

    /// Control tube `CNTL1` or `CNTL2`
    Control(u8),
}

impl SourcePosition {
    /// Resolve the `aspirate tray` / `aspirate location` pair of a sheet row
    ///
    /// With zero racks every sample sits in the 96-well lysate plate and the
    /// tray column is ignored.
    pub fn resolve(
        tray: &str,
        location: &str,
        sample_racks: u8,
        controls_allowed: bool,
    ) -> NormResult<Self> {
        let location_upper = location.trim().to_ascii_uppercase();

        if let Some(n) = location_upper.strip_prefix("CNTL") {
            return match (controls_allowed, n) {
                (true, "1") => Ok(Self::Control(1)),
                (true, "2") => Ok(Self::Control(2)),
                (false, _) => Err(NormError::Layout(format!(
                    "control position '{location_upper}' is not available in this protocol"
                ))),
                _ => Err(NormError::Layout(format!("unknown control position '{location_upper}'"))),
            };
        }

        if sample_racks == 0 {
            let well = WellAddress::parse(&location_upper, LabwareFormat::Plate96)?;
            return Ok(Self::Plate { well });
        }

        let tray: u8 = tray
            .trim()
            .parse()
            .map_err(|_| NormError::Layout(format!("invalid tray number '{}'", tray.trim())))?;
        if tray == 0 || tray > sample_racks {
            return Err(NormError::Layout(format!(
                "tray {tray} is not loaded (protocol uses {sample_racks} sample rack(s))"
            )));
        }
        let well = WellAddress::parse(&location_upper, LabwareFormat::TubeRack24)?;
        Ok(Self::Rack { tray, well })
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rack { tray, well } => write!(f, "rack{tray}:{well}"),
            Self::Plate { well } => write!(f, "lysate:{well}"),
            Self::Control(n) => write!(f, "CNTL{n}"),
        }
    }
}

/// Check the distinct sample positions fit on the loaded racks or plate
pub fn check_source_capacity(positions: &[SourcePosition], sample_racks: u8) -> NormResult<()> {
    let mut distinct: Vec<&SourcePosition> = positions
        .iter()
        .filter(|p| !matches!(p, SourcePosition::Control(_)))
        .collect();
    distinct.sort_by_key(|p| p.to_string());
    distinct.dedup();

    let capacity = if sample_racks == 0 {
        LabwareFormat::Plate96.capacity()
    } else {
        sample_racks as usize * LabwareFormat::TubeRack24.capacity()
    };

    if distinct.len() > capacity {
        return Err(NormError::Layout(format!(
            "{} sample positions do not fit in a capacity of {}",
            distinct.len(),
            capacity
        )));
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================
