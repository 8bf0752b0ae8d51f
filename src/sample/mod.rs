//! Sample data model
//!
//! The two read-only inputs of the volume calculator:
//!
//! - [`SampleRecord`]: one measured sample (id, concentration, available volume)
//! - [`AssayParameters`]: run-wide target and instrument limits
//!
//! Both validate on construction so the calculator never sees a zero
//! concentration or a negative volume.
//!
//! # Units
//!
//! | Quantity      | Unit  |
//! |---------------|-------|
//! | volume        | µL    |
//! | concentration | µg/µL |
//! | quantity      | µg    |

pub mod parameters;
pub mod record;

pub use parameters::{AssayParameters, Target};
pub use record::SampleRecord;
