//! Sample records
//!
//! A [`SampleRecord`] is one measured sample: an identifier, its protein
//! concentration (µg/µL) and the volume left in the tube (µL). Records are
//! immutable once built and can only be built through [`SampleRecord::new`],
//! so every record handed to the calculator already satisfies
//! `concentration > 0` and `available_volume > 0`.

use crate::error::InputError;

// =================================================================================================
// Sample Record
// =================================================================================================

/// One sample to normalize
///
/// # Example
///
/// ```rust
/// use norm_rs::sample::SampleRecord;
///
/// let lysate = SampleRecord::new("lysate-1", 2.0, 50.0).unwrap();
/// assert_eq!(lysate.id(), "lysate-1");
/// assert!((lysate.total_quantity() - 100.0).abs() < 1e-12);
///
/// // Zero concentration is rejected before any computation
/// assert!(SampleRecord::new("blank", 0.0, 50.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    id: String,
    concentration: f64,
    available_volume: f64,
}

impl SampleRecord {
    /// Create a validated record
    ///
    /// # Errors
    ///
    /// [`InputError::NonPositive`] when the concentration or the available
    /// volume is zero, negative, NaN or infinite.
    pub fn new(
        id: impl Into<String>,
        concentration: f64,
        available_volume: f64,
    ) -> Result<Self, InputError> {
        check_positive("concentration", concentration)?;
        check_positive("available volume", available_volume)?;

        Ok(Self {
            id: id.into(),
            concentration,
            available_volume,
        })
    }

    /// Parse a record from raw text fields (as read from a sheet)
    pub fn parse(id: &str, concentration: &str, available_volume: &str) -> Result<Self, InputError> {
        let concentration = parse_number("concentration", concentration)?;
        let available_volume = parse_number("available volume", available_volume)?;
        Self::new(id.trim(), concentration, available_volume)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Measured concentration (µg/µL)
    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    /// Volume available in the source tube (µL)
    pub fn available_volume(&self) -> f64 {
        self.available_volume
    }

    /// Protein mass in the whole tube (µg)
    pub fn total_quantity(&self) -> f64 {
        self.concentration * self.available_volume
    }
}

// =================================================================================================
// Field helpers
// =================================================================================================

/// Reject zero, negative and non-finite values
pub(crate) fn check_positive(field: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(InputError::NonPositive { field, value })
    }
}

/// Reject negative and non-finite values (zero allowed)
pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(InputError::Negative { field, value })
    }
}

/// Parse a trimmed decimal field
pub(crate) fn parse_number(field: &'static str, raw: &str) -> Result<f64, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::Missing { field });
    }
    trimmed.parse::<f64>().map_err(|_| InputError::NonNumeric {
        field,
        value: trimmed.to_string(),
    })
}

// =================================================================================================
// Tests
// =================================================================================================
