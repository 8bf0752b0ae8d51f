//! Volume calculator
//!
//! Determines how much sample and how much diluent go into each destination
//! well so that every well ends up with the same protein quantity in the same
//! final volume.
//!
//! # Algorithm
//!
//! ```text
//! c*  = target concentration         (Quantity(q) → q / V,  Concentration(c) → c)
//! Vs  = c* · V / c_sample            (required sample volume)
//! Vd  = V − Vs                       (diluent volume)
//! ```
//!
//! followed by three feasibility checks, in this order:
//!
//! 1. `Vs > available`   → [`Infeasibility::InsufficientSample`]
//! 2. `Vs < min pipette` → [`Infeasibility::BelowMinimumPipetteVolume`]
//! 3. `Vd < 0`           → [`Infeasibility::TargetVolumeTooSmall`]
//!
//! and finally rounding of both volumes to the pipette resolution (half away
//! from zero) with a re-check of the floor and of `Vs + Vd == V`. A rounded
//! plan whose delivered quantity drifts beyond `quantity_tolerance` is
//! rejected with [`Infeasibility::OutsideQuantityTolerance`]; this never
//! happens when `min_pipette_volume >= volume_resolution / quantity_tolerance`.
//!
//! Too-dilute samples are rejected, never clamped to the available volume: the
//! error reports the quantity the whole tube could deliver so that the caller
//! can lower the target and re-plan.
//!
//! # Example
//!
//! ```rust
//! use norm_rs::calculator::compute_transfer_plan;
//! use norm_rs::sample::{AssayParameters, SampleRecord, Target};
//!
//! let params = AssayParameters::new(Target::Quantity(100.0), 200.0);
//! let sample = SampleRecord::new("lysate-1", 2.0, 50.0).unwrap();
//!
//! let plan = compute_transfer_plan(&sample, &params).unwrap();
//! assert_eq!(plan.sample_volume, 50.0);
//! assert_eq!(plan.diluent_volume, 150.0);
//! ```
//!
//! # Modules
//!
//! - [`plan`]: output types
//! - [`rounding`]: pipette resolution helpers
//! - [`dilution`]: dilution ladders and calibration standards (BCA)
//! - [`standard_curve`]: absorbance → concentration calibration

pub mod dilution;
pub mod plan;
pub mod rounding;
pub mod standard_curve;

pub use dilution::{
    plan_dilution_factor, plan_dilution_series, plan_standards, DilutionLadder, StandardStock,
};
pub use plan::{PlanOutcome, TransferPlan};
pub use standard_curve::StandardCurve;

use crate::error::Infeasibility;
use crate::sample::{AssayParameters, SampleRecord};
use rounding::{floor_to_resolution, round_to_resolution, sums_to};

/// Slack on volume comparisons (µL), absorbs `c · V / c` round-off
const VOLUME_EPSILON: f64 = 1e-9;

/// Slack on the relative quantity error
const TOLERANCE_EPSILON: f64 = 1e-9;

// =================================================================================================
// Single sample
// =================================================================================================

/// Compute the transfer plan of one sample
///
/// Pure function of its inputs. `params` is expected to have passed
/// [`AssayParameters::validate`]; `sample` is valid by construction.
///
/// # Errors
///
/// One of the [`Infeasibility`] variants; see the module documentation for
/// the order in which they are checked.
pub fn compute_transfer_plan(sample: &SampleRecord, params: &AssayParameters) -> PlanOutcome {
    let final_volume = params.target_final_volume;
    let target_concentration = params.target_concentration();
    let target_quantity = params.target_quantity();

    // ====== Required volumes ======

    let required = target_concentration * final_volume / sample.concentration();

    if required > sample.available_volume() + VOLUME_EPSILON {
        return Err(Infeasibility::InsufficientSample {
            required,
            available: sample.available_volume(),
            achievable_quantity: sample.total_quantity(),
        });
    }

    if required < params.min_pipette_volume {
        return Err(Infeasibility::BelowMinimumPipetteVolume {
            required,
            minimum: params.min_pipette_volume,
        });
    }

    if final_volume - required < -VOLUME_EPSILON {
        return Err(Infeasibility::TargetVolumeTooSmall {
            required,
            target_final_volume: final_volume,
        });
    }

    // ====== Rounding to pipette resolution ======

    let step = params.volume_resolution;
    let mut sample_volume = round_to_resolution(required, step);

    // Rounding up may ask for a hair more than the tube holds
    if sample_volume > sample.available_volume() {
        sample_volume = floor_to_resolution(required, step);
    }

    if sample_volume < params.min_pipette_volume {
        return Err(Infeasibility::BelowMinimumPipetteVolume {
            required: sample_volume,
            minimum: params.min_pipette_volume,
        });
    }

    if sample_volume > final_volume + VOLUME_EPSILON {
        return Err(Infeasibility::TargetVolumeTooSmall {
            required: sample_volume,
            target_final_volume: final_volume,
        });
    }

    let mut diluent_volume = round_to_resolution((final_volume - sample_volume).max(0.0), step);
    if !sums_to(sample_volume, diluent_volume, final_volume) {
        // final volume off the resolution grid: keep the exact complement
        log::debug!(
            "{}: final volume {} µL is not a multiple of {} µL, diluent left unrounded",
            sample.id(),
            final_volume,
            step
        );
        diluent_volume = final_volume - sample_volume;
    }

    let plan = TransferPlan {
        sample_id: sample.id().to_string(),
        sample_volume,
        diluent_volume,
        target_concentration,
        target_quantity,
        achieved_quantity: sample_volume * sample.concentration(),
    };

    if !plan.within_tolerance(params.quantity_tolerance + TOLERANCE_EPSILON) {
        log::debug!(
            "{}: rounding to {} µL is {:.2}% off the target",
            plan.sample_id,
            plan.sample_volume,
            plan.relative_quantity_error() * 100.0
        );
        return Err(Infeasibility::OutsideQuantityTolerance {
            volume: plan.sample_volume,
            achieved: plan.achieved_quantity,
            target: plan.target_quantity,
            tolerance: params.quantity_tolerance,
        });
    }

    log::debug!(
        "{}: {:.1} µL sample + {:.1} µL diluent",
        plan.sample_id,
        plan.sample_volume,
        plan.diluent_volume
    );

    Ok(plan)
}

// =================================================================================================
// Batch
// =================================================================================================

/// Plan every sample, preserving input order
///
/// A failing sample never stops the batch; each infeasibility is logged at
/// `warn` level and returned in its slot.
pub fn compute_transfer_plans(samples: &[SampleRecord], params: &AssayParameters) -> Vec<PlanOutcome> {
    samples
        .iter()
        .map(|sample| {
            let outcome = compute_transfer_plan(sample, params);
            if let Err(reason) = &outcome {
                log::warn!("{}: {}", sample.id(), reason);
            }
            outcome
        })
        .collect()
}

/// Count of feasible and infeasible outcomes
pub fn summarize(outcomes: &[PlanOutcome]) -> (usize, usize) {
    let feasible = outcomes.iter().filter(|o| o.is_ok()).count();
    (feasible, outcomes.len() - feasible)
}

// =================================================================================================
// Tests
// =================================================================================================
