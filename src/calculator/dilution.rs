//! Dilution ladders and calibration standards
//!
//! The BCA workflow reuses the normalization calculator in three ways:
//!
//! - **Sample dilutions**: a sheet row asks for a dilution factor `d`, i.e. a
//!   target concentration of `c / d` ([`plan_dilution_factor`]).
//! - **Dilution series**: one sample taken through a ladder of target
//!   concentrations ([`plan_dilution_series`]).
//! - **Calibration standards**: a known-concentration stock taken through a
//!   ladder ([`plan_standards`]).
//!
//! Every step is an independent `Target::Concentration` run through
//! [`compute_transfer_plan`], so the same feasibility rules apply everywhere.
//!
//! # Example
//!
//! ```rust
//! use norm_rs::calculator::{plan_standards, DilutionLadder, StandardStock};
//! use norm_rs::sample::{AssayParameters, Target};
//!
//! let bsa = StandardStock::new("BSA", 2.0, 1000.0);
//! let ladder = DilutionLadder::geometric(1.0, 2.0, 4).unwrap();
//! let params = AssayParameters::new(Target::Concentration(1.0), 100.0);
//!
//! let steps = plan_standards(&bsa, &ladder, &params).unwrap();
//! assert_eq!(steps.len(), 4);
//! assert_eq!(steps[0].outcome.as_ref().unwrap().sample_volume, 50.0);
//! ```

use crate::calculator::{compute_transfer_plan, PlanOutcome};
use crate::error::InputError;
use crate::sample::record::check_positive;
use crate::sample::{AssayParameters, SampleRecord, Target};

/// Pierce BCA standard concentrations without the blank (µg/µL)
pub const BCA_STANDARD_LADDER: [f64; 8] = [2.0, 1.5, 1.0, 0.75, 0.5, 0.25, 0.125, 0.025];

/// Concentration used for samples whose concentration is unknown
///
/// With a relative stock of 1.0 the calculator reduces to
/// `sample = final / d`, which is how the BCA plate is prepared.
pub const RELATIVE_CONCENTRATION: f64 = 1.0;

// =================================================================================================
// Dilution Ladder
// =================================================================================================

/// Ordered sequence of target concentrations (µg/µL)
#[derive(Debug, Clone, PartialEq)]
pub enum DilutionLadder {
    /// `top, top/factor, top/factor², …` for `steps` steps
    Geometric { top: f64, factor: f64, steps: usize },

    /// User-specified concentrations, in the given order
    Explicit(Vec<f64>),
}

impl DilutionLadder {
    /// Geometric ladder
    ///
    /// # Errors
    ///
    /// `top` must be positive, `factor` strictly greater than 1 and at least
    /// one step requested.
    pub fn geometric(top: f64, factor: f64, steps: usize) -> Result<Self, InputError> {
        check_positive("ladder top", top)?;
        if !(factor.is_finite() && factor > 1.0) {
            return Err(InputError::Inconsistent(format!(
                "ladder factor must be greater than 1, got {factor}"
            )));
        }
        if steps == 0 {
            return Err(InputError::Inconsistent("ladder needs at least one step".to_string()));
        }
        Ok(Self::Geometric { top, factor, steps })
    }

    /// Explicit ladder; every concentration must be positive
    pub fn explicit(concentrations: Vec<f64>) -> Result<Self, InputError> {
        if concentrations.is_empty() {
            return Err(InputError::Inconsistent("ladder needs at least one step".to_string()));
        }
        for &c in &concentrations {
            check_positive("ladder concentration", c)?;
        }
        Ok(Self::Explicit(concentrations))
    }

    /// Default BCA standards, see [`BCA_STANDARD_LADDER`]
    ///
    /// The lowest steps need a large well: from a 2 µg/µL stock in 20 µL
    /// wells, 0.125 µg/µL is 1.25 µL of stock and 0.025 µg/µL only 0.25 µL,
    /// which the default pipette floor and resolution cannot deliver. Use a
    /// shorter explicit ladder for small wells.
    pub fn bca_standards() -> Self {
        Self::Explicit(BCA_STANDARD_LADDER.to_vec())
    }

    /// Target concentrations, top first
    pub fn concentrations(&self) -> Vec<f64> {
        match self {
            Self::Geometric { top, factor, steps } => {
                (0..*steps).map(|i| top / factor.powi(i as i32)).collect()
            }
            Self::Explicit(values) => values.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Geometric { steps, .. } => *steps,
            Self::Explicit(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =================================================================================================
// Standard Stock
// =================================================================================================

/// Known-concentration stock used for calibration wells
#[derive(Debug, Clone, PartialEq)]
pub struct StandardStock {
    pub name: String,
    /// Stock concentration (µg/µL)
    pub concentration: f64,
    /// Stock volume available (µL)
    pub available_volume: f64,
}

impl StandardStock {
    pub fn new(name: impl Into<String>, concentration: f64, available_volume: f64) -> Self {
        Self {
            name: name.into(),
            concentration,
            available_volume,
        }
    }

    /// Stock as a sample record labelled with the step concentration
    fn record_for(&self, step_concentration: f64) -> Result<SampleRecord, InputError> {
        SampleRecord::new(
            format!("{} {} µg/µL", self.name, step_concentration),
            self.concentration,
            self.available_volume,
        )
    }
}

/// One calibration well
#[derive(Debug, Clone, PartialEq)]
pub struct StandardStep {
    /// Target concentration of the well (µg/µL)
    pub concentration: f64,
    pub outcome: PlanOutcome,
}

// =================================================================================================
// Planning
// =================================================================================================

/// Plan a sample diluted by `factor` (1 = neat)
///
/// # Errors
///
/// [`InputError`] when `factor < 1`; the plan itself may still be infeasible.
pub fn plan_dilution_factor(
    sample: &SampleRecord,
    factor: f64,
    params: &AssayParameters,
) -> Result<PlanOutcome, InputError> {
    if !(factor.is_finite() && factor >= 1.0) {
        return Err(InputError::Inconsistent(format!(
            "dilution factor must be at least 1, got {factor}"
        )));
    }
    let target = Target::Concentration(sample.concentration() / factor);
    Ok(compute_transfer_plan(sample, &params.with_target(target)))
}

/// Plan one well per ladder step for a single sample
pub fn plan_dilution_series(
    sample: &SampleRecord,
    ladder: &DilutionLadder,
    params: &AssayParameters,
) -> Vec<PlanOutcome> {
    ladder
        .concentrations()
        .into_iter()
        .map(|c| compute_transfer_plan(sample, &params.with_target(Target::Concentration(c))))
        .collect()
}

/// Plan the calibration wells of a standard stock
///
/// # Errors
///
/// [`InputError`] when the stock itself is invalid (non-positive
/// concentration or volume).
pub fn plan_standards(
    stock: &StandardStock,
    ladder: &DilutionLadder,
    params: &AssayParameters,
) -> Result<Vec<StandardStep>, InputError> {
    ladder
        .concentrations()
        .into_iter()
        .map(|c| {
            let record = stock.record_for(c)?;
            Ok(StandardStep {
                concentration: c,
                outcome: compute_transfer_plan(
                    &record,
                    &params.with_target(Target::Concentration(c)),
                ),
            })
        })
        .collect()
}

// =================================================================================================
// Tests
// =================================================================================================
