//! Assay parameters
//!
//! Global configuration shared by every sample of a run. The target is either
//! a protein **quantity** per well (µg) or a **concentration** (µg/µL); the two
//! modes are mutually exclusive by construction of [`Target`].

use crate::error::{NormError, NormResult};

/// Default pipetting resolution (µL)
pub const DEFAULT_VOLUME_RESOLUTION: f64 = 0.1;

/// Default relative tolerance on the delivered quantity
pub const DEFAULT_QUANTITY_TOLERANCE: f64 = 0.01;

/// Default instrument floor (µL), the P20 lower limit
pub const DEFAULT_MIN_PIPETTE_VOLUME: f64 = 1.0;

/// Capacity of a Nunc 96 deep-well plate well (µL)
pub const DEFAULT_MAX_WELL_CAPACITY: f64 = 1300.0;

// =================================================================================================
// Target
// =================================================================================================

/// What every destination well must end up with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Total protein per well (µg)
    Quantity(f64),

    /// Protein concentration in the final well (µg/µL)
    Concentration(f64),
}

impl Target {
    /// Concentration-equivalent of the target for a given final volume
    ///
    /// ```rust
    /// use norm_rs::sample::Target;
    ///
    /// assert_eq!(Target::Quantity(100.0).concentration_in(200.0), 0.5);
    /// assert_eq!(Target::Concentration(0.5).concentration_in(200.0), 0.5);
    /// ```
    pub fn concentration_in(&self, final_volume: f64) -> f64 {
        match *self {
            Self::Quantity(q) => q / final_volume,
            Self::Concentration(c) => c,
        }
    }

    /// Quantity-equivalent of the target for a given final volume (µg)
    pub fn quantity_in(&self, final_volume: f64) -> f64 {
        match *self {
            Self::Quantity(q) => q,
            Self::Concentration(c) => c * final_volume,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            Self::Quantity(v) | Self::Concentration(v) => v,
        }
    }
}

// =================================================================================================
// Assay Parameters
// =================================================================================================

/// Run-wide calculator parameters
///
/// # Fields
///
/// - `target`: quantity or concentration mode
/// - `target_final_volume`: volume in every destination well (µL)
/// - `min_pipette_volume`: smallest accurate transfer (µL)
/// - `max_well_capacity`: destination well/tube capacity (µL)
/// - `volume_resolution`: rounding step for both volumes (µL)
/// - `quantity_tolerance`: accepted relative error on the delivered quantity
///
/// # Example
///
/// ```rust
/// use norm_rs::sample::{AssayParameters, Target};
///
/// let params = AssayParameters::new(Target::Quantity(100.0), 200.0)
///     .min_pipette_volume(2.0)
///     .max_well_capacity(1300.0);
///
/// assert!(params.validate().is_ok());
/// assert_eq!(params.target_concentration(), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AssayParameters {
    pub target: Target,
    pub target_final_volume: f64,
    pub min_pipette_volume: f64,
    pub max_well_capacity: f64,
    pub volume_resolution: f64,
    pub quantity_tolerance: f64,
}

impl AssayParameters {
    /// Parameters with instrument defaults for everything but the target
    pub fn new(target: Target, target_final_volume: f64) -> Self {
        Self {
            target,
            target_final_volume,
            min_pipette_volume: DEFAULT_MIN_PIPETTE_VOLUME,
            max_well_capacity: DEFAULT_MAX_WELL_CAPACITY,
            volume_resolution: DEFAULT_VOLUME_RESOLUTION,
            quantity_tolerance: DEFAULT_QUANTITY_TOLERANCE,
        }
    }

    /// Builder pattern: set the instrument floor
    pub fn min_pipette_volume(mut self, volume: f64) -> Self {
        self.min_pipette_volume = volume;
        self
    }

    /// Builder pattern: set the well capacity
    pub fn max_well_capacity(mut self, volume: f64) -> Self {
        self.max_well_capacity = volume;
        self
    }

    /// Builder pattern: set the rounding step
    pub fn volume_resolution(mut self, step: f64) -> Self {
        self.volume_resolution = step;
        self
    }

    /// Builder pattern: set the quantity tolerance
    pub fn quantity_tolerance(mut self, tolerance: f64) -> Self {
        self.quantity_tolerance = tolerance;
        self
    }

    /// Same parameters with another target (used for dilution ladders)
    pub fn with_target(&self, target: Target) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }

    /// Concentration-equivalent target (µg/µL)
    pub fn target_concentration(&self) -> f64 {
        self.target.concentration_in(self.target_final_volume)
    }

    /// Quantity-equivalent target (µg)
    pub fn target_quantity(&self) -> f64 {
        self.target.quantity_in(self.target_final_volume)
    }

    /// Check the parameters are physically meaningful
    ///
    /// # Errors
    ///
    /// - any value zero, negative or non-finite
    /// - final volume above the well capacity
    /// - pipette floor above the final volume
    pub fn validate(&self) -> NormResult<()> {
        let positive = [
            ("target", self.target.value()),
            ("target_final_volume", self.target_final_volume),
            ("min_pipette_volume", self.min_pipette_volume),
            ("max_well_capacity", self.max_well_capacity),
            ("volume_resolution", self.volume_resolution),
            ("quantity_tolerance", self.quantity_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(NormError::invalid(name, format!("must be a finite positive number, got {value}")));
            }
        }

        if self.target_final_volume > self.max_well_capacity {
            return Err(NormError::invalid(
                "target_final_volume",
                format!(
                    "{} µL does not fit in a {} µL well",
                    self.target_final_volume, self.max_well_capacity
                ),
            ));
        }

        if self.min_pipette_volume > self.target_final_volume {
            return Err(NormError::invalid(
                "min_pipette_volume",
                format!(
                    "{} µL is larger than the final volume {} µL",
                    self.min_pipette_volume, self.target_final_volume
                ),
            ));
        }

        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_mode_implied_concentration() {
        let params = AssayParameters::new(Target::Quantity(100.0), 200.0);
        assert_eq!(params.target_concentration(), 0.5);
        assert_eq!(params.target_quantity(), 100.0);
    }

    #[test]
    fn test_concentration_mode_is_used_directly() {
        let params = AssayParameters::new(Target::Concentration(0.25), 400.0);
        assert_eq!(params.target_concentration(), 0.25);
        assert_eq!(params.target_quantity(), 100.0);
    }

    #[test]
    fn test_defaults() {
        let params = AssayParameters::new(Target::Quantity(50.0), 100.0);
        assert_eq!(params.volume_resolution, DEFAULT_VOLUME_RESOLUTION);
        assert_eq!(params.min_pipette_volume, DEFAULT_MIN_PIPETTE_VOLUME);
        assert_eq!(params.max_well_capacity, DEFAULT_MAX_WELL_CAPACITY);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overfull_well() {
        let params = AssayParameters::new(Target::Quantity(50.0), 250.0).max_well_capacity(200.0);
        assert!(matches!(
            params.validate(),
            Err(NormError::InvalidParameter { ref name, .. }) if name == "target_final_volume"
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_target() {
        let params = AssayParameters::new(Target::Concentration(0.0), 200.0);
        assert!(params.validate().is_err());

        let params = AssayParameters::new(Target::Quantity(f64::NAN), 200.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_floor_above_final_volume() {
        let params = AssayParameters::new(Target::Quantity(10.0), 20.0).min_pipette_volume(25.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_with_target_keeps_instrument_settings() {
        let params = AssayParameters::new(Target::Quantity(10.0), 100.0).min_pipette_volume(2.0);
        let ladder_step = params.with_target(Target::Concentration(0.05));
        assert_eq!(ladder_step.min_pipette_volume, 2.0);
        assert_eq!(ladder_step.target, Target::Concentration(0.05));
    }
}
