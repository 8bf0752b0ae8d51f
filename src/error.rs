//! Error types
//!
//! Three families of errors, matching the three places things go wrong:
//!
//! | Type             | Scope          | Fatal? | Raised by                          |
//! |------------------|----------------|--------|------------------------------------|
//! | [`InputError`]   | one sheet row  | no     | record / parameter validation      |
//! | [`Infeasibility`]| one sample     | no     | [`compute_transfer_plan`]          |
//! | [`NormError`]    | whole run      | yes    | file I/O, parameters, deck layout  |
//!
//! The first two are collected per row and reported; the caller decides
//! whether to skip, warn or abort. Only the orchestration layer ever returns a
//! [`NormError`].
//!
//! [`compute_transfer_plan`]: crate::calculator::compute_transfer_plan

use thiserror::Error;

// =================================================================================================
// Per-row input errors
// =================================================================================================

/// Malformed input detected before any volume is computed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("field '{field}' is missing")]
    Missing { field: &'static str },

    #[error("field '{field}' is not a number: '{value}'")]
    NonNumeric { field: &'static str, value: String },

    #[error("field '{field}' must be a finite positive number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("field '{field}' must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{0}")]
    Inconsistent(String),
}

// =================================================================================================
// Per-sample infeasibility
// =================================================================================================

/// Reason why a sample cannot be brought to the requested target
///
/// Volumes are in µL, quantities in µg.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Infeasibility {
    /// The sample is too dilute: reaching the target needs more than is in the tube.
    ///
    /// `achievable_quantity` is what the entire available volume would deliver.
    #[error("insufficient sample: needs {required:.2} µL, only {available:.2} µL available \
             (at most {achievable_quantity:.2} µg deliverable)")]
    InsufficientSample {
        required: f64,
        available: f64,
        achievable_quantity: f64,
    },

    /// The sample is so concentrated that the volume is under the pipette floor.
    #[error("below minimum pipette volume: {required:.2} µL < {minimum:.2} µL")]
    BelowMinimumPipetteVolume { required: f64, minimum: f64 },

    /// The required sample volume alone overflows the target final volume.
    #[error("target volume too small: sample needs {required:.2} µL, target final volume is \
             {target_final_volume:.2} µL")]
    TargetVolumeTooSmall {
        required: f64,
        target_final_volume: f64,
    },

    /// Rounding to the pipette resolution moves the delivered quantity more
    /// than `tolerance` (relative) away from the target.
    #[error("outside quantity tolerance: rounded {volume:.2} µL delivers {achieved:.3} µg for a \
             {target:.3} µg target (tolerance {tolerance})")]
    OutsideQuantityTolerance {
        volume: f64,
        achieved: f64,
        target: f64,
        tolerance: f64,
    },
}

impl Infeasibility {
    /// Short machine-friendly tag, used in CSV reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientSample { .. } => "insufficient_sample",
            Self::BelowMinimumPipetteVolume { .. } => "below_minimum_pipette_volume",
            Self::TargetVolumeTooSmall { .. } => "target_volume_too_small",
            Self::OutsideQuantityTolerance { .. } => "outside_quantity_tolerance",
        }
    }
}

// =================================================================================================
// Fatal errors
// =================================================================================================

/// Errors that stop a protocol run before any transfer is issued
#[derive(Error, Debug)]
pub enum NormError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("deck layout error: {0}")]
    Layout(String),

    #[error("not enough {reagent}: need at least {needed:.1} µL, have {available:.1} µL")]
    InsufficientReagent {
        reagent: String,
        needed: f64,
        available: f64,
    },

    #[error("sample sheet row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: InputError,
    },

    #[error("{0}")]
    Calibration(String),
}

impl NormError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type NormResult<T> = Result<T, NormError>;
