//! Deck and labware rules
//!
//! Everything the planner needs to know about the physical deck, without
//! driving it:
//!
//! - [`well`]: well addresses, sample source positions, rack capacity
//! - [`labware`]: reagent tubes, liquid-level tracking, pipette selection
//!
//! # Deck layout
//!
//! ```text
//! slot 11, 10, 7, 4 : 24-tube eppendorf sample racks 1–4   (or lysate plate in 11)
//! slot 8            : destination plate
//! slot 9            : 15/50 ml Falcon rack (reagents)
//! slot 10           : 2 ml eppendorf rack (reagents, normalizer)
//! slots 5, 2 / 6, 3 : 300 µL / 20 µL tip racks
//! ```

pub mod labware;
pub mod well;

pub use labware::{LiquidLevel, Pipette, TubeSize};
pub use well::{check_source_capacity, LabwareFormat, SourcePosition, WellAddress};
