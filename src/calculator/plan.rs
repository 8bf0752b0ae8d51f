//! Transfer plans
//!
//! A [`TransferPlan`] is the calculator's verdict for one sample when the
//! target is reachable. Infeasible samples produce an
//! [`Infeasibility`](crate::error::Infeasibility) instead; both are carried by
//! [`PlanOutcome`].

use crate::error::Infeasibility;

/// Result of planning one sample
pub type PlanOutcome = Result<TransferPlan, Infeasibility>;

/// Sample and diluent volumes for one destination well
///
/// # Invariants
///
/// For every plan returned by
/// [`compute_transfer_plan`](crate::calculator::compute_transfer_plan):
///
/// - `sample_volume + diluent_volume == target_final_volume` (± 0.01 µL)
/// - `min_pipette_volume <= sample_volume <= available_volume`
/// - `diluent_volume >= 0`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    /// Identifier of the source sample
    pub sample_id: String,

    /// Sample to transfer (µL), rounded to the pipetting resolution
    pub sample_volume: f64,

    /// Diluent to transfer (µL), rounded to the pipetting resolution
    pub diluent_volume: f64,

    /// Concentration-equivalent target (µg/µL)
    pub target_concentration: f64,

    /// Quantity-equivalent target (µg)
    pub target_quantity: f64,

    /// Quantity actually delivered after rounding (µg)
    pub achieved_quantity: f64,
}

impl TransferPlan {
    /// Final well volume (µL)
    pub fn total_volume(&self) -> f64 {
        self.sample_volume + self.diluent_volume
    }

    /// Relative deviation of the delivered quantity from the target
    pub fn relative_quantity_error(&self) -> f64 {
        if self.target_quantity.abs() < f64::EPSILON {
            self.achieved_quantity.abs()
        } else {
            (self.achieved_quantity - self.target_quantity).abs() / self.target_quantity
        }
    }

    /// Whether the delivered quantity is within `tolerance` of the target
    pub fn within_tolerance(&self, tolerance: f64) -> bool {
        self.relative_quantity_error() <= tolerance
    }

    /// True when no diluent is needed
    pub fn is_neat(&self) -> bool {
        self.diluent_volume <= 0.0
    }
}
