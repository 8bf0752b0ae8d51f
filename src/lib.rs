//! norm-rs: Protein Normalization Planning for the OT-2
//!
//! Turns a sample sheet (protein concentration and available volume per
//! tube) into per-well sample and diluent volumes, and those volumes into a
//! worklist for a two-pipette liquid handler. A second protocol lays out a
//! BCA assay plate: diluted samples, a standard ladder and blanks.
//!
//! # Architecture
//!
//! norm-rs is built on two core principles:
//!
//! 1. **Separation of Arithmetic and Deck**
//!    - The calculator only sees numbers (what to pipette)
//!    - Protocols map sheet rows onto labware (where to pipette)
//!
//! 2. **Per-row verdicts**
//!    - A sample that cannot reach the target is reported, never clamped
//!    - One bad row never hides the others
//!
//! # Quick Start
//!
//! ```rust
//! use norm_rs::prelude::*;
//!
//! let params = AssayParameters::new(Target::Concentration(0.5), 200.0);
//! let samples = vec![
//!     SampleRecord::new("lysate-1", 2.0, 150.0).unwrap(),
//!     SampleRecord::new("lysate-2", 0.2, 150.0).unwrap(),
//! ];
//!
//! let outcomes = compute_transfer_plans(&samples, &params);
//!
//! let plan = outcomes[0].as_ref().unwrap();
//! assert_eq!(plan.sample_volume, 50.0);
//! assert_eq!(plan.diluent_volume, 150.0);
//!
//! // Too dilute: 500 µL would be needed, only 150 µL are in the tube
//! assert_eq!(outcomes[1].as_ref().unwrap_err().code(), "insufficient_sample");
//! ```
//!
//! # Modules
//!
//! - [`sample`]: Sample records and assay parameters
//! - [`calculator`]: Volume arithmetic, dilution ladders, standard curves
//! - [`deck`]: Wells, tubes, pipettes
//! - [`protocols`]: Parameter files, sample sheets, normalizer and BCA planning
//! - [`worklist`]: Liquid handling steps and their execution
//! - [`output`]: CSV export and terminal summary
//! - [`cli`]: Command-line interface

pub mod error;

// Core modules
pub mod calculator;
pub mod sample;

pub mod deck;
pub mod protocols;
pub mod worklist;

pub mod cli;
pub mod output;

pub use error::{Infeasibility, InputError, NormError, NormResult};

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //!
    //! use norm_rs::prelude::*;
    //! ```
    pub use crate::calculator::{compute_transfer_plan,
                                compute_transfer_plans,
                                PlanOutcome,
                                TransferPlan};
    pub use crate::error::{Infeasibility, InputError, NormError, NormResult};
    pub use crate::protocols::{plan_bca_files,
                               plan_normalizer_files,
                               ProtocolPlan,
                               RowOutcome};
    pub use crate::sample::{AssayParameters, SampleRecord, Target};
    pub use crate::worklist::{run, TransferExecutor, TransferStep, Worklist};
}
