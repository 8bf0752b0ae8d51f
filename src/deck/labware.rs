//! Reagent tubes, liquid levels and pipettes
//!
//! # Liquid level
//!
//! Reagents sit in conical tubes; the tip must stay below the meniscus without
//! hitting the cone. Above the cone the level falls linearly with the volume
//! drawn, with a slope set by the tube cross-section:
//!
//! | Tube   | Cone volume | Cone height | mm per µL |
//! |--------|-------------|-------------|-----------|
//! | 2 ml   | 500 µL      | 10 mm       | 0.0160    |
//! | 15 ml  | 1500 µL     | 23 mm       | 0.00635   |
//! | 50 ml  | 4000 µL     | 20 mm       | 0.00175   |
//!
//! The aspiration height is kept 5 mm below the surface and never below 1 mm
//! from the bottom; once the liquid is down in the cone the tip goes straight
//! to 1 mm.

use std::fmt;
use std::str::FromStr;

use crate::deck::well::LabwareFormat;
use crate::error::{NormError, NormResult};

/// Depth of the tip below the liquid surface (mm)
pub const IMMERSION_DEPTH: f64 = 5.0;

/// Lowest aspiration height above the tube bottom (mm)
pub const MIN_ASPIRATION_HEIGHT: f64 = 1.0;

// =================================================================================================
// Tube sizes
// =================================================================================================

/// Reagent tube types accepted on the deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TubeSize {
    TwoMl,
    FifteenMl,
    FiftyMl,
}

impl TubeSize {
    /// Volume held by the conical bottom (µL)
    pub fn cone_volume(&self) -> f64 {
        match self {
            Self::TwoMl => 500.0,
            Self::FifteenMl => 1500.0,
            Self::FiftyMl => 4000.0,
        }
    }

    /// Height of the conical bottom (mm)
    pub fn cone_height(&self) -> f64 {
        match self {
            Self::TwoMl => 10.0,
            Self::FifteenMl => 23.0,
            Self::FiftyMl => 20.0,
        }
    }

    /// Level drop per µL above the cone (mm/µL), 1 / (π r²)
    pub fn mm_per_ul(&self) -> f64 {
        match self {
            Self::TwoMl => 0.0160,
            Self::FifteenMl => 0.00635,
            Self::FiftyMl => 0.00175,
        }
    }

    /// Nominal capacity (µL)
    pub fn capacity(&self) -> f64 {
        match self {
            Self::TwoMl => 2_000.0,
            Self::FifteenMl => 15_000.0,
            Self::FiftyMl => 50_000.0,
        }
    }

    /// Rack the tube is loaded in: 2 ml eppendorf rack or Falcon rack
    pub fn rack_format(&self) -> LabwareFormat {
        match self {
            Self::TwoMl => LabwareFormat::TubeRack24,
            Self::FifteenMl | Self::FiftyMl => LabwareFormat::FalconRack,
        }
    }

    /// Aspiration height for a given volume (mm)
    pub fn aspiration_height(&self, volume: f64) -> f64 {
        if volume > self.cone_volume() {
            let h = self.cone_height() + (volume - self.cone_volume()) * self.mm_per_ul()
                - IMMERSION_DEPTH;
            h.max(MIN_ASPIRATION_HEIGHT)
        } else {
            MIN_ASPIRATION_HEIGHT
        }
    }
}

impl FromStr for TubeSize {
    type Err = NormError;

    /// Accepts `2 ml`, `15 ml`, `50 ml` (case and spacing insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.as_str() {
            "2ml" => Ok(Self::TwoMl),
            "15ml" => Ok(Self::FifteenMl),
            "50ml" => Ok(Self::FiftyMl),
            _ => Err(NormError::invalid(
                "tube_size",
                format!("'{}' is not one of 2 ml, 15 ml, 50 ml", s.trim()),
            )),
        }
    }
}

impl fmt::Display for TubeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TwoMl => "2 ml",
            Self::FifteenMl => "15 ml",
            Self::FiftyMl => "50 ml",
        };
        write!(f, "{label}")
    }
}

// =================================================================================================
// Liquid level tracking
// =================================================================================================

/// Remaining volume and current aspiration height of a reagent tube
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidLevel {
    name: String,
    tube: TubeSize,
    volume: f64,
    height: f64,
}

impl LiquidLevel {
    /// Start tracking a tube filled with `volume` µL
    pub fn new(name: impl Into<String>, tube: TubeSize, volume: f64) -> NormResult<Self> {
        let name = name.into();
        if !(volume.is_finite() && volume >= 0.0) {
            return Err(NormError::invalid(format!("{name} volume"), format!("{volume} µL")));
        }
        if volume > tube.capacity() {
            return Err(NormError::invalid(
                format!("{name} volume"),
                format!("{volume} µL does not fit in a {tube} tube"),
            ));
        }
        Ok(Self {
            height: tube.aspiration_height(volume),
            name,
            tube,
            volume,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tube(&self) -> TubeSize {
        self.tube
    }

    /// Volume left (µL)
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Height of the next aspiration (mm)
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Draw `amount` µL; returns the height the aspiration is made at
    ///
    /// # Errors
    ///
    /// [`NormError::InsufficientReagent`] when the tube holds less than `amount`.
    pub fn draw(&mut self, amount: f64) -> NormResult<f64> {
        if amount > self.volume + 1e-9 {
            return Err(NormError::InsufficientReagent {
                reagent: self.name.clone(),
                needed: amount,
                available: self.volume,
            });
        }

        let used_height = self.height;
        self.volume = (self.volume - amount).max(0.0);

        if self.volume < self.tube.cone_volume() {
            self.height = MIN_ASPIRATION_HEIGHT;
        } else {
            self.height = (self.height - amount * self.tube.mm_per_ul()).max(MIN_ASPIRATION_HEIGHT);
        }

        Ok(used_height)
    }
}

// =================================================================================================
// Pipettes
// =================================================================================================

/// Largest volume handed to the P20 (µL); anything above goes to the P300
pub const P20_THRESHOLD: f64 = 20.0;

/// Single-channel GEN2 pipettes mounted on the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pipette {
    /// 1–20 µL, right mount
    P20,
    /// 20–300 µL, left mount
    P300,
}

impl Pipette {
    /// Pipette for a transfer, or `None` for a zero volume
    ///
    /// ```rust
    /// use norm_rs::deck::Pipette;
    ///
    /// assert_eq!(Pipette::for_volume(20.0), Some(Pipette::P20));
    /// assert_eq!(Pipette::for_volume(20.1), Some(Pipette::P300));
    /// assert_eq!(Pipette::for_volume(0.0), None);
    /// ```
    pub fn for_volume(volume: f64) -> Option<Self> {
        if volume <= 0.0 {
            None
        } else if volume > P20_THRESHOLD {
            Some(Self::P300)
        } else {
            Some(Self::P20)
        }
    }

    /// Maximum volume of one aspiration (µL)
    pub fn max_volume(&self) -> f64 {
        match self {
            Self::P20 => 20.0,
            Self::P300 => 300.0,
        }
    }

    /// Opentrons instrument name
    pub fn load_name(&self) -> &'static str {
        match self {
            Self::P20 => "p20_single_gen2",
            Self::P300 => "p300_single_gen2",
        }
    }

    /// Split a volume into equal aspirations no larger than the pipette maximum
    pub fn split(&self, volume: f64) -> Vec<f64> {
        if volume <= 0.0 {
            return vec![];
        }
        let trips = (volume / self.max_volume()).ceil().max(1.0) as usize;
        vec![volume / trips as f64; trips]
    }
}

impl fmt::Display for Pipette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::P20 => write!(f, "P20"),
            Self::P300 => write!(f, "P300"),
        }
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tube_size_parsing() {
        assert_eq!("15 ml".parse::<TubeSize>().unwrap(), TubeSize::FifteenMl);
        assert_eq!("50ML".parse::<TubeSize>().unwrap(), TubeSize::FiftyMl);
        assert_eq!(" 2 ml ".parse::<TubeSize>().unwrap(), TubeSize::TwoMl);
        assert!("1.5 ml".parse::<TubeSize>().is_err());
    }

    #[test]
    fn test_starting_heights() {
        // 15 ml tube with 5 ml: 23 + 3500 * 0.00635 − 5
        assert_relative_eq!(TubeSize::FifteenMl.aspiration_height(5000.0), 40.225, epsilon = 1e-9);
        // 2 ml tube with 1.5 ml: 10 + 1000 * 0.016 − 5
        assert_relative_eq!(TubeSize::TwoMl.aspiration_height(1500.0), 21.0, epsilon = 1e-9);
        // inside the cone
        assert_eq!(TubeSize::FiftyMl.aspiration_height(3000.0), MIN_ASPIRATION_HEIGHT);
    }

    #[test]
    fn test_draw_lowers_level() {
        let mut level = LiquidLevel::new("diluent", TubeSize::FifteenMl, 5000.0).unwrap();
        let first = level.draw(100.0).unwrap();
        assert_relative_eq!(first, 40.225, epsilon = 1e-9);
        assert_relative_eq!(level.height(), 40.225 - 0.635, epsilon = 1e-9);
        assert_relative_eq!(level.volume(), 4900.0);
    }

    #[test]
    fn test_draw_into_cone_drops_to_bottom() {
        let mut level = LiquidLevel::new("tcep", TubeSize::TwoMl, 600.0).unwrap();
        level.draw(200.0).unwrap();
        assert_eq!(level.height(), MIN_ASPIRATION_HEIGHT);
        assert_relative_eq!(level.volume(), 400.0);
    }

    #[test]
    fn test_draw_more_than_available_fails() {
        let mut level = LiquidLevel::new("iam", TubeSize::TwoMl, 50.0).unwrap();
        assert!(matches!(level.draw(60.0), Err(NormError::InsufficientReagent { .. })));
        assert_relative_eq!(level.volume(), 50.0);
    }

    #[test]
    fn test_overfilled_tube_rejected() {
        assert!(LiquidLevel::new("diluent", TubeSize::TwoMl, 2500.0).is_err());
    }

    #[test]
    fn test_pipette_split() {
        assert_eq!(Pipette::P300.split(450.0), vec![225.0, 225.0]);
        assert_eq!(Pipette::P300.split(300.0), vec![300.0]);
        assert!(Pipette::P20.split(0.0).is_empty());
    }
}
