//! Transfer worklist and execution seam
//!
//! Protocols never drive the robot directly. They compile their plans into a
//! [`Worklist`]: an ordered list of [`TransferStep`]s that a
//! [`TransferExecutor`] carries out. The Opentrons binding is one executor;
//! [`RecordingExecutor`] is another, used for dry runs and tests.
//!
//! # Design
//!
//! - `TransferStep` is a closed enum: a liquid transfer, an operator pause, or
//!   homing the gantry.
//! - A transfer carries everything the robot needs for one
//!   aspirate/dispense cycle: pipette, volume, source, destination well,
//!   aspiration height, optional pre-mix, post-aspiration delay and whether a
//!   fresh tip is picked up first.
//! - [`run`] feeds the steps in order and stops at the first executor error.
//!
//! # Example
//!
//! ```rust
//! use norm_rs::deck::{Pipette, SourcePosition, WellAddress};
//! use norm_rs::worklist::{run, RecordingExecutor, Source, Transfer, TransferStep, Worklist};
//!
//! let mut worklist = Worklist::new();
//! worklist.push(TransferStep::Transfer(Transfer {
//!     pipette: Pipette::P300,
//!     volume: 50.0,
//!     source: Source::Sample(SourcePosition::Control(1)),
//!     destination: WellAddress::new(0, 1),
//!     aspirate_height: 1.0,
//!     mix: None,
//!     delay_secs: 0.0,
//!     new_tip: true,
//! }));
//!
//! let mut recorder = RecordingExecutor::default();
//! assert_eq!(run(&worklist, &mut recorder).unwrap(), 1);
//! assert_eq!(recorder.steps().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use thiserror::Error;

use crate::deck::{Pipette, SourcePosition, TubeSize, WellAddress};

// =================================================================================================
// Steps
// =================================================================================================

/// Where a transfer aspirates from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A sheet sample: rack tube, lysate plate well or control tube
    Sample(SourcePosition),

    /// A reagent tube (diluent, TCEP, IAM, BCA reagent, standard stock)
    Reagent {
        name: String,
        tube: TubeSize,
        well: WellAddress,
    },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample(position) => write!(f, "{position}"),
            Self::Reagent { name, well, .. } => write!(f, "{name}:{well}"),
        }
    }
}

/// Mix performed in the source before aspirating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mix {
    /// Pipette doing the mixing; may differ from the one that transfers
    pub pipette: Pipette,
    pub repetitions: u32,
    /// µL
    pub volume: f64,
}

/// One aspirate/dispense cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub pipette: Pipette,
    /// µL, never more than the pipette maximum
    pub volume: f64,
    pub source: Source,
    pub destination: WellAddress,
    /// Height above the source bottom (mm)
    pub aspirate_height: f64,
    pub mix: Option<Mix>,
    /// Pause after aspiration for viscous lysates (s)
    pub delay_secs: f64,
    /// Drop the current tip and pick up a fresh one before aspirating
    pub new_tip: bool,
}

/// Instruction for the liquid handler
#[derive(Debug, Clone, PartialEq)]
pub enum TransferStep {
    Transfer(Transfer),

    /// Wait for the operator, e.g. while the plate is heated off deck
    Pause { message: String },

    Home,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer(t) => write!(
                f,
                "{} {:.1} µL {} -> {}",
                t.pipette, t.volume, t.source, t.destination
            ),
            Self::Pause { message } => write!(f, "pause: {message}"),
            Self::Home => write!(f, "home"),
        }
    }
}

// =================================================================================================
// Worklist
// =================================================================================================

/// Ordered steps of a protocol run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worklist {
    steps: Vec<TransferStep>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: TransferStep) {
        self.steps.push(step);
    }

    /// Append a transfer, split into trips the pipette can hold
    ///
    /// Only the first trip picks up a new tip and mixes; a zero volume adds
    /// nothing.
    pub fn push_transfer(&mut self, transfer: Transfer) {
        let trips = transfer.pipette.split(transfer.volume);
        for (i, volume) in trips.into_iter().enumerate() {
            let first = i == 0;
            self.steps.push(TransferStep::Transfer(Transfer {
                volume,
                mix: if first { transfer.mix } else { None },
                new_tip: transfer.new_tip && first,
                source: transfer.source.clone(),
                ..transfer
            }));
        }
    }

    pub fn steps(&self) -> &[TransferStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.steps.iter().filter_map(|s| match s {
            TransferStep::Transfer(t) => Some(t),
            _ => None,
        })
    }

    /// Total volume moved per pipette (µL)
    pub fn volume_by_pipette(&self) -> BTreeMap<Pipette, f64> {
        let mut totals = BTreeMap::new();
        for t in self.transfers() {
            *totals.entry(t.pipette).or_insert(0.0) += t.volume;
        }
        totals
    }

    /// Total volume aspirated per source (µL), keyed by the source label
    pub fn volume_by_source(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for t in self.transfers() {
            *totals.entry(t.source.to_string()).or_insert(0.0) += t.volume;
        }
        totals
    }

    /// Tips consumed per pipette, mixing with a second pipette included
    pub fn tips_by_pipette(&self) -> BTreeMap<Pipette, usize> {
        let mut tips = BTreeMap::new();
        for t in self.transfers() {
            if t.new_tip {
                *tips.entry(t.pipette).or_insert(0) += 1;
            }
            if let Some(mix) = t.mix {
                if mix.pipette != t.pipette {
                    *tips.entry(mix.pipette).or_insert(0) += 1;
                }
            }
        }
        tips
    }
}

// =================================================================================================
// Execution
// =================================================================================================

/// Liquid handler that carries out worklist steps
///
/// # Associated type `Error`
///
/// Each backend reports its own failures (lost connection, tip pickup,
/// labware not found…) without boxing.
pub trait TransferExecutor {
    type Error: std::error::Error + 'static;

    fn execute(&mut self, step: &TransferStep) -> Result<(), Self::Error>;
}

/// Executor that keeps every step in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    steps: Vec<TransferStep>,
}

impl RecordingExecutor {
    pub fn steps(&self) -> &[TransferStep] {
        &self.steps
    }
}

impl TransferExecutor for RecordingExecutor {
    type Error = Infallible;

    fn execute(&mut self, step: &TransferStep) -> Result<(), Self::Error> {
        self.steps.push(step.clone());
        Ok(())
    }
}

/// Failure of one step while running a worklist
#[derive(Error, Debug)]
#[error("step {index} ({step}) failed: {source}")]
pub struct ExecutionError<E: std::error::Error + 'static> {
    /// Zero-based index of the failing step
    pub index: usize,
    pub step: String,
    #[source]
    pub source: E,
}

/// Execute every step in order; returns the number of steps run
///
/// # Errors
///
/// The first executor error, with the index of the step that raised it.
/// Later steps are not attempted.
pub fn run<X: TransferExecutor>(
    worklist: &Worklist,
    executor: &mut X,
) -> Result<usize, ExecutionError<X::Error>> {
    log::info!("running worklist: {} steps", worklist.len());

    for (index, step) in worklist.steps().iter().enumerate() {
        log::debug!("step {index}: {step}");
        executor.execute(step).map_err(|source| ExecutionError {
            index,
            step: step.to_string(),
            source,
        })?;
    }

    Ok(worklist.len())
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diluent() -> Source {
        Source::Reagent {
            name: "diluent".to_string(),
            tube: TubeSize::FifteenMl,
            well: WellAddress::new(0, 1),
        }
    }

    fn transfer(pipette: Pipette, volume: f64) -> Transfer {
        Transfer {
            pipette,
            volume,
            source: diluent(),
            destination: WellAddress::new(1, 3),
            aspirate_height: 1.0,
            mix: None,
            delay_secs: 0.0,
            new_tip: true,
        }
    }

    #[derive(Debug, Error)]
    #[error("tip rack empty")]
    struct TipRackEmpty;

    /// Fails on the n-th step
    struct FailingExecutor {
        fail_at: usize,
        seen: usize,
    }

    impl TransferExecutor for FailingExecutor {
        type Error = TipRackEmpty;

        fn execute(&mut self, _step: &TransferStep) -> Result<(), Self::Error> {
            if self.seen == self.fail_at {
                return Err(TipRackEmpty);
            }
            self.seen += 1;
            Ok(())
        }
    }

    #[test]
    fn test_push_transfer_splits_large_volumes() {
        let mut worklist = Worklist::new();
        worklist.push_transfer(Transfer {
            mix: Some(Mix { pipette: Pipette::P300, repetitions: 3, volume: 100.0 }),
            ..transfer(Pipette::P300, 700.0)
        });

        let trips: Vec<&Transfer> = worklist.transfers().collect();
        assert_eq!(trips.len(), 3);
        assert!(trips.iter().all(|t| t.volume <= 300.0));
        assert!(trips[0].new_tip && trips[0].mix.is_some());
        assert!(!trips[1].new_tip && trips[1].mix.is_none());
        assert_relative_eq!(worklist.volume_by_pipette()[&Pipette::P300], 700.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_volume_transfer_is_dropped() {
        let mut worklist = Worklist::new();
        worklist.push_transfer(transfer(Pipette::P20, 0.0));
        assert!(worklist.is_empty());
    }

    #[test]
    fn test_totals() {
        let mut worklist = Worklist::new();
        worklist.push_transfer(transfer(Pipette::P20, 12.5));
        worklist.push_transfer(Transfer {
            mix: Some(Mix { pipette: Pipette::P300, repetitions: 2, volume: 50.0 }),
            ..transfer(Pipette::P20, 7.5)
        });
        worklist.push(TransferStep::Home);

        assert_relative_eq!(worklist.volume_by_source()["diluent:A1"], 20.0);
        let tips = worklist.tips_by_pipette();
        assert_eq!(tips[&Pipette::P20], 2);
        assert_eq!(tips[&Pipette::P300], 1);
    }

    #[test]
    fn test_run_records_all_steps_in_order() {
        let mut worklist = Worklist::new();
        worklist.push_transfer(transfer(Pipette::P20, 10.0));
        worklist.push(TransferStep::Pause { message: "swap plate".to_string() });
        worklist.push(TransferStep::Home);

        let mut recorder = RecordingExecutor::default();
        assert_eq!(run(&worklist, &mut recorder).unwrap(), 3);
        assert_eq!(recorder.steps(), worklist.steps());
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let mut worklist = Worklist::new();
        for _ in 0..4 {
            worklist.push_transfer(transfer(Pipette::P20, 5.0));
        }

        let mut executor = FailingExecutor { fail_at: 2, seen: 0 };
        let err = run(&worklist, &mut executor).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(executor.seen, 2);
        assert!(err.to_string().contains("tip rack empty"));
    }
}
