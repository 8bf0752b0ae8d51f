//! Bench protocols
//!
//! The orchestration layer around the calculator: it reads the parameter
//! file and the sample sheet, validates the deck, plans every row and
//! compiles the result into a [`Worklist`].
//!
//! | Protocol                 | Output plate               | Rows planned with                    |
//! |--------------------------|----------------------------|--------------------------------------|
//! | [`normalizer`]           | 96 deep-well digest plate  | [`compute_transfer_plan`] or given volumes |
//! | [`bca`]                  | 96-well BCA plate          | [`plan_dilution_factor`], standards  |
//!
//! Fatal problems (files, parameters, layout, reagent shortfalls) abort with
//! a [`NormError`] before any step is emitted. Per-row problems are kept in
//! the returned [`ProtocolPlan`] and the row is left out of the worklist.
//!
//! [`compute_transfer_plan`]: crate::calculator::compute_transfer_plan
//! [`plan_dilution_factor`]: crate::calculator::plan_dilution_factor

pub mod bca;
pub mod normalizer;
pub mod params;
pub mod sheet;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use bca::{plan_bca, plan_bca_files, BcaConfig};
pub use normalizer::{plan_normalizer, plan_normalizer_files, NormalizerConfig};
pub use params::{str_to_bool, ParameterTable};
pub use sheet::{read_sheet, read_sheet_from_path, BcaRow, NormalizerRow};

use crate::calculator::TransferPlan;
use crate::deck::{check_source_capacity, LabwareFormat, LiquidLevel, Pipette, SourcePosition, TubeSize, WellAddress};
use crate::error::{Infeasibility, InputError, NormError, NormResult};
use crate::worklist::{Mix, Source, Transfer, Worklist};

/// Most sample racks the deck holds
pub const MAX_SAMPLE_RACKS: u32 = 4;

/// Extra diluent left in the tube (µL)
pub const DILUENT_RESERVE: f64 = 100.0;

/// Extra control sample left in the tube (µL)
pub const CONTROL_RESERVE: f64 = 100.0;

/// Extra TCEP/IAM left in the tube (µL)
pub const ADDITIVE_RESERVE: f64 = 20.0;

// =================================================================================================
// Row outcomes
// =================================================================================================

/// What happened to one sheet row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Volumes computed by the calculator
    Calculated(TransferPlan),

    /// Volumes taken from the sheet
    Given { sample_volume: f64, diluent_volume: f64 },

    Infeasible(Infeasibility),

    Invalid(InputError),
}

impl RowOutcome {
    /// `(sample, diluent)` volumes of a row that will be pipetted
    pub fn volumes(&self) -> Option<(f64, f64)> {
        match self {
            Self::Calculated(plan) => Some((plan.sample_volume, plan.diluent_volume)),
            Self::Given { sample_volume, diluent_volume } => Some((*sample_volume, *diluent_volume)),
            Self::Infeasible(_) | Self::Invalid(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.volumes().is_some()
    }

    /// Short status tag for reports
    pub fn status(&self) -> &'static str {
        match self {
            Self::Calculated(_) => "planned",
            Self::Given { .. } => "given",
            Self::Infeasible(reason) => reason.code(),
            Self::Invalid(_) => "invalid_input",
        }
    }

    /// Human-readable reason for a skipped row
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Infeasible(reason) => Some(reason.to_string()),
            Self::Invalid(error) => Some(error.to_string()),
            _ => None,
        }
    }
}

/// One destination well of a protocol
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    /// 1-based sheet row; generated rows (standards, blanks) continue the count
    pub row: usize,
    pub name: String,
    pub source: Source,
    pub destination: WellAddress,
    pub outcome: RowOutcome,
}

/// Planned rows and the worklist built from the ready ones
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolPlan {
    pub rows: Vec<RowPlan>,
    pub worklist: Worklist,
}

impl ProtocolPlan {
    pub fn ready_count(&self) -> usize {
        self.rows.iter().filter(|r| r.outcome.is_ready()).count()
    }

    /// Rows left out of the worklist
    pub fn skipped(&self) -> impl Iterator<Item = &RowPlan> {
        self.rows.iter().filter(|r| !r.outcome.is_ready())
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }
}

// =================================================================================================
// Shared settings
// =================================================================================================

/// Mixing of the sample tube before aspiration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixSettings {
    pub repetitions: u32,
    /// µL
    pub volume: f64,
}

impl MixSettings {
    /// Read `mix`, `mix_reps` and `mix_vol`; `None` when mixing is off
    pub fn from_table(table: &ParameterTable) -> NormResult<Option<Self>> {
        if !table.flag_or("mix", false)? {
            return Ok(None);
        }
        let repetitions = table.integer("mix_reps")?;
        let volume = table.number("mix_vol")?;
        if repetitions == 0 {
            return Err(NormError::invalid("mix_reps", "must be at least 1 when mixing"));
        }
        if !(volume > 0.0 && volume <= Pipette::P300.max_volume()) {
            return Err(NormError::invalid(
                "mix_vol",
                format!("{volume} µL is outside 0–{} µL", Pipette::P300.max_volume()),
            ));
        }
        Ok(Some(Self { repetitions, volume }))
    }

    /// Samples are always mixed with the P300, whatever pipette transfers them
    fn mix(&self) -> Mix {
        Mix {
            pipette: Pipette::P300,
            repetitions: self.repetitions,
            volume: self.volume,
        }
    }
}

/// A reagent or control tube on the deck
#[derive(Debug, Clone, PartialEq)]
pub struct ReagentTube {
    pub name: String,
    pub tube: TubeSize,
    pub location: WellAddress,
    /// Volume loaded (µL)
    pub volume: f64,
}

impl ReagentTube {
    /// Read `<prefix>_location`, `<prefix>_tube_size` and `<prefix>_vol`
    pub fn from_table(table: &ParameterTable, name: &str, prefix: &str) -> NormResult<Self> {
        let size_key = format!("{prefix}_tube_size");
        let tube = table.tube_size(&size_key)?;
        let location = table.tube_location(&format!("{prefix}_location"), tube)?;

        let volume_key = format!("{prefix}_vol");
        let volume = table.number(&volume_key)?;
        if volume < 0.0 {
            return Err(NormError::invalid(volume_key, format!("{volume} µL is negative")));
        }

        Ok(Self {
            name: name.to_string(),
            tube,
            location,
            volume,
        })
    }

    pub fn source(&self) -> Source {
        Source::Reagent {
            name: self.name.clone(),
            tube: self.tube,
            well: self.location,
        }
    }

    pub fn level(&self) -> NormResult<LiquidLevel> {
        LiquidLevel::new(self.name.clone(), self.tube, self.volume)
    }

    /// Fail unless the tube holds `needed` µL
    pub fn require(&self, needed: f64) -> NormResult<()> {
        if needed > self.volume {
            return Err(NormError::InsufficientReagent {
                reagent: self.name.clone(),
                needed,
                available: self.volume,
            });
        }
        Ok(())
    }
}

/// Per-well addition of a reagent from one tube
#[derive(Debug, Clone, PartialEq)]
pub struct ReagentAddition {
    pub tube: ReagentTube,
    /// µL per well
    pub per_well: f64,
}

impl ReagentAddition {
    /// Read an optional addition switched on by `flag`
    pub fn from_table(
        table: &ParameterTable,
        flag: &str,
        name: &str,
        prefix: &str,
    ) -> NormResult<Option<Self>> {
        if !table.flag_or(flag, false)? {
            return Ok(None);
        }
        let tube = ReagentTube::from_table(table, name, prefix)?;
        let per_well_key = format!("{prefix}_vol_perWell");
        let per_well = table.number(&per_well_key)?;
        if per_well <= 0.0 {
            return Err(NormError::invalid(per_well_key, format!("{per_well} µL must be positive")));
        }
        Ok(Some(Self { tube, per_well }))
    }

    /// Reagent needed for `wells` wells, dead volume included
    pub fn needed_for(&self, wells: usize) -> f64 {
        wells as f64 * self.per_well + ADDITIVE_RESERVE
    }
}

/// Read `number_of_sample_racks` (0 = lysate plate, 1–4 = tube racks)
pub fn sample_racks(table: &ParameterTable) -> NormResult<u8> {
    let racks = table.integer("number_of_sample_racks")?;
    if racks > MAX_SAMPLE_RACKS {
        return Err(NormError::invalid(
            "number_of_sample_racks",
            format!("{racks}; use 1–{MAX_SAMPLE_RACKS} tube racks or 0 for one 96-well plate"),
        ));
    }
    Ok(racks as u8)
}

/// Sheet path from `inputCSVfilename`, relative to the parameter file
pub fn sheet_path(table: &ParameterTable, params_path: &Path) -> NormResult<PathBuf> {
    let name = PathBuf::from(table.text("inputCSVfilename")?);
    if name.is_absolute() {
        return Ok(name);
    }
    Ok(params_path
        .parent()
        .map(|dir| dir.join(&name))
        .unwrap_or(name))
}

// =================================================================================================
// Layout checks
// =================================================================================================

/// Parse the dispense wells of a sheet and check they fit one plate without overlap
pub(crate) fn destination_wells<'a, I>(locations: I) -> NormResult<Vec<WellAddress>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut wells = Vec::new();

    for location in locations {
        let well = WellAddress::parse(location, LabwareFormat::Plate96)?;
        if !seen.insert(well) {
            return Err(NormError::Layout(format!("dispense location {well} is used twice")));
        }
        wells.push(well);
    }

    if wells.len() > LabwareFormat::Plate96.capacity() {
        return Err(NormError::Layout(format!(
            "{} wells do not fit on one 96-well plate",
            wells.len()
        )));
    }
    Ok(wells)
}

/// Resolve every aspirate position and check they fit on the loaded racks
pub(crate) fn source_positions<'a, I>(
    pairs: I,
    sample_racks: u8,
    controls_allowed: bool,
) -> NormResult<Vec<SourcePosition>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let positions = pairs
        .into_iter()
        .map(|(tray, location)| SourcePosition::resolve(tray, location, sample_racks, controls_allowed))
        .collect::<NormResult<Vec<_>>>()?;
    check_source_capacity(&positions, sample_racks)?;
    Ok(positions)
}

// =================================================================================================
// Worklist building
// =================================================================================================

/// Settings shared by every sample transfer of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleHandling {
    /// Height above the tube or well bottom (mm)
    pub aspiration_height: f64,
    pub delay_secs: f64,
    pub mix: Option<MixSettings>,
}

impl SampleHandling {
    /// Read `sample_aspiration_height`, `aspiration_delay_sec` and the mix settings
    pub fn from_table(table: &ParameterTable) -> NormResult<Self> {
        let aspiration_height = table.number("sample_aspiration_height")?;
        if aspiration_height <= 0.0 {
            return Err(NormError::invalid(
                "sample_aspiration_height",
                format!("{aspiration_height} mm must be positive"),
            ));
        }
        let delay_secs = table.number_or("aspiration_delay_sec", 0.0)?;
        if delay_secs < 0.0 {
            return Err(NormError::invalid("aspiration_delay_sec", format!("{delay_secs} s is negative")));
        }
        Ok(Self {
            aspiration_height,
            delay_secs,
            mix: MixSettings::from_table(table)?,
        })
    }
}

/// Emit the sample transfer of a row, mixing first when enabled
///
/// `height` overrides the fixed sample aspiration height (control tubes).
pub(crate) fn push_sample_transfer(
    worklist: &mut Worklist,
    handling: &SampleHandling,
    source: Source,
    destination: WellAddress,
    volume: f64,
    height: Option<f64>,
) {
    let Some(pipette) = Pipette::for_volume(volume) else {
        return;
    };
    worklist.push_transfer(Transfer {
        pipette,
        volume,
        source,
        destination,
        aspirate_height: height.unwrap_or(handling.aspiration_height),
        mix: handling.mix.map(|m| m.mix()),
        delay_secs: handling.delay_secs,
        new_tip: true,
    });
}

/// Emit one reagent transfer per trip, tracking the tube level
pub(crate) fn push_reagent_transfer(
    worklist: &mut Worklist,
    tube: &ReagentTube,
    level: &mut LiquidLevel,
    destination: WellAddress,
    volume: f64,
    new_tip: bool,
) -> NormResult<()> {
    let Some(pipette) = Pipette::for_volume(volume) else {
        return Ok(());
    };
    for (i, trip) in pipette.split(volume).into_iter().enumerate() {
        let aspirate_height = level.draw(trip)?;
        worklist.push_transfer(Transfer {
            pipette,
            volume: trip,
            source: tube.source(),
            destination,
            aspirate_height,
            mix: None,
            delay_secs: 0.0,
            new_tip: new_tip && i == 0,
        });
    }
    Ok(())
}
