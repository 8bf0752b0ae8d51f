//! Protein normalizer
//!
//! Brings every sheet row to the same protein amount in the same final
//! volume on a 96 deep-well plate, optionally with TCEP/enolase before the
//! samples and iodoacetamide after an off-deck reduction.
//!
//! # Run order
//!
//! 1. TCEP/enolase into every planned well, one tip for the whole pass
//! 2. Per row: sample (mixed first when enabled), delay, then diluent
//! 3. Home, pause for reduction, then IAM into every planned well with a
//!    fresh tip each time
//!
//! # Sheet modes
//!
//! A row with a `concentration` is planned by
//! [`compute_transfer_plan`](crate::calculator::compute_transfer_plan); a
//! row with `sample volume` / `diluent volume` is pipetted as written.

use std::path::Path;

use crate::calculator::compute_transfer_plan;
use crate::deck::{LiquidLevel, SourcePosition, WellAddress};
use crate::error::{Infeasibility, InputError, NormError, NormResult};
use crate::protocols::{
    destination_wells, push_reagent_transfer, push_sample_transfer, read_sheet_from_path,
    sample_racks, sheet_path, source_positions, NormalizerRow, ParameterTable, ProtocolPlan,
    ReagentAddition, ReagentTube, RowOutcome, RowPlan, SampleHandling, CONTROL_RESERVE,
    DILUENT_RESERVE,
};
use crate::sample::parameters::{
    DEFAULT_MAX_WELL_CAPACITY, DEFAULT_MIN_PIPETTE_VOLUME, DEFAULT_QUANTITY_TOLERANCE,
    DEFAULT_VOLUME_RESOLUTION,
};
use crate::sample::record::{check_non_negative, parse_number};
use crate::sample::{AssayParameters, SampleRecord, Target};
use crate::worklist::{Source, TransferStep, Worklist};

/// Operator message shown before the IAM pass
pub const REDUCTION_PAUSE: &str = "Heat the plate for disulfide reduction, cool it to room \
                                   temperature and return it to slot 8.";

// =================================================================================================
// Configuration
// =================================================================================================

/// Normalizer run settings, read from the parameter file
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    /// 1–4 tube racks, 0 for one lysate plate
    pub sample_racks: u8,
    pub handling: SampleHandling,
    pub diluent: ReagentTube,
    pub tcep: Option<ReagentAddition>,
    pub iam: Option<ReagentAddition>,
    /// `CNTL1` and `CNTL2` tubes
    pub controls: [Option<ReagentTube>; 2],
    /// Calculator settings; `None` when the sheet gives volumes directly
    pub assay: Option<AssayParameters>,
    pub min_pipette_volume: f64,
    pub max_well_capacity: f64,
}

impl NormalizerConfig {
    pub fn from_table(table: &ParameterTable) -> NormResult<Self> {
        let min_pipette_volume = table.number_or("min_pipette_vol", DEFAULT_MIN_PIPETTE_VOLUME)?;
        let max_well_capacity = table.number_or("max_well_capacity", DEFAULT_MAX_WELL_CAPACITY)?;

        let target = match (
            table.optional_number("target_quantity")?,
            table.optional_number("target_concentration")?,
        ) {
            (Some(_), Some(_)) => {
                return Err(NormError::invalid(
                    "target_quantity",
                    "give either target_quantity or target_concentration, not both",
                ))
            }
            (Some(q), None) => Some(Target::Quantity(q)),
            (None, Some(c)) => Some(Target::Concentration(c)),
            (None, None) => None,
        };

        let assay = match target {
            Some(target) => {
                let params = AssayParameters::new(target, table.number("target_final_volume")?)
                    .min_pipette_volume(min_pipette_volume)
                    .max_well_capacity(max_well_capacity)
                    .volume_resolution(table.number_or("volume_resolution", DEFAULT_VOLUME_RESOLUTION)?)
                    .quantity_tolerance(table.number_or("quantity_tolerance", DEFAULT_QUANTITY_TOLERANCE)?);
                params.validate()?;
                Some(params)
            }
            None => None,
        };

        let control = |flag: &str, name: &str, prefix: &str| -> NormResult<Option<ReagentTube>> {
            if table.flag_or(flag, false)? {
                ReagentTube::from_table(table, name, prefix).map(Some)
            } else {
                Ok(None)
            }
        };

        Ok(Self {
            sample_racks: sample_racks(table)?,
            handling: SampleHandling::from_table(table)?,
            diluent: ReagentTube::from_table(table, "diluent", "diluent")?,
            tcep: ReagentAddition::from_table(table, "add_tcep", "TCEP/enolase", "tcep")?,
            iam: ReagentAddition::from_table(table, "add_iam", "IAM", "iam")?,
            controls: [
                control("control_1", "control 1", "cntl1")?,
                control("control_2", "control 2", "cntl2")?,
            ],
            assay,
            min_pipette_volume,
            max_well_capacity,
        })
    }

    fn control(&self, n: u8) -> Option<&ReagentTube> {
        self.controls.get(usize::from(n).wrapping_sub(1))?.as_ref()
    }

    /// Volume added to every well on top of sample and diluent (µL)
    fn additive_per_well(&self) -> f64 {
        self.tcep.as_ref().map_or(0.0, |a| a.per_well) + self.iam.as_ref().map_or(0.0, |a| a.per_well)
    }
}

// =================================================================================================
// Planning
// =================================================================================================

/// Plan a normalizer sheet and build its worklist
///
/// # Errors
///
/// Layout problems (addresses, trays, rack capacity, duplicate wells, more
/// than 96 rows, controls not loaded), reagent or control shortfalls and
/// overfilled wells are fatal. Infeasible or malformed rows are reported in
/// the returned plan and left out of the worklist.
pub fn plan_normalizer(config: &NormalizerConfig, rows: &[NormalizerRow]) -> NormResult<ProtocolPlan> {
    let wells = destination_wells(rows.iter().map(|r| r.dispense_location.as_str()))?;
    let controls_loaded = config.controls.iter().any(Option::is_some);
    let positions = source_positions(
        rows.iter()
            .map(|r| (r.aspirate_tray.as_str(), r.aspirate_location.as_str())),
        config.sample_racks,
        controls_loaded,
    )?;

    for position in &positions {
        if let SourcePosition::Control(n) = position {
            if config.control(*n).is_none() {
                return Err(NormError::Layout(format!("{position} is used but control_{n} is off")));
            }
        }
    }

    let mut planned = Vec::with_capacity(rows.len());
    for (i, ((row, well), position)) in rows.iter().zip(wells).zip(positions).enumerate() {
        let outcome = plan_row(row, config)?;
        if let Some(reason) = outcome.reason() {
            log::warn!("row {} '{}' skipped: {}", i + 1, row.sample_name, reason);
        }
        planned.push(RowPlan {
            row: i + 1,
            name: row.sample_name.clone(),
            source: Source::Sample(position),
            destination: well,
            outcome,
        });
    }

    check_supplies(config, &planned)?;
    let worklist = build_worklist(config, &planned)?;

    let plan = ProtocolPlan { rows: planned, worklist };
    log::info!(
        "normalizer: {} wells planned, {} rows skipped, {} steps",
        plan.ready_count(),
        plan.skipped_count(),
        plan.worklist.len()
    );
    Ok(plan)
}

/// Read the parameter file and its sheet, then plan
///
/// `sheet` overrides the `inputCSVfilename` parameter.
pub fn plan_normalizer_files(params_path: &Path, sheet: Option<&Path>) -> NormResult<ProtocolPlan> {
    let table = ParameterTable::from_path(params_path)?;
    let config = NormalizerConfig::from_table(&table)?;
    let sheet = match sheet {
        Some(path) => path.to_path_buf(),
        None => sheet_path(&table, params_path)?,
    };
    let rows: Vec<NormalizerRow> = read_sheet_from_path(&sheet)?;
    plan_normalizer(&config, &rows)
}

fn plan_row(row: &NormalizerRow, config: &NormalizerConfig) -> NormResult<RowOutcome> {
    if row.sample_name.is_empty() {
        return Ok(RowOutcome::Invalid(InputError::Missing { field: "sample name" }));
    }

    if let Some(concentration) = &row.concentration {
        let assay = config.assay.as_ref().ok_or_else(|| {
            NormError::MissingParameter("target_quantity or target_concentration".to_string())
        })?;
        let available = row.available_volume.as_deref().unwrap_or("");
        let outcome = match SampleRecord::parse(&row.sample_name, concentration, available) {
            Ok(record) => match compute_transfer_plan(&record, assay) {
                Ok(plan) => RowOutcome::Calculated(plan),
                Err(reason) => RowOutcome::Infeasible(reason),
            },
            Err(e) => RowOutcome::Invalid(e),
        };
        return Ok(outcome);
    }

    if row.sample_volume.is_none() && row.diluent_volume.is_none() {
        return Ok(RowOutcome::Invalid(InputError::Inconsistent(
            "row needs a concentration or a sample volume and diluent volume".to_string(),
        )));
    }

    Ok(given_volumes(row, config.min_pipette_volume))
}

fn given_volumes(row: &NormalizerRow, min_pipette_volume: f64) -> RowOutcome {
    let parse = |field: &'static str, raw: &Option<String>| {
        parse_number(field, raw.as_deref().unwrap_or("")).and_then(|v| check_non_negative(field, v))
    };

    let (sample_volume, diluent_volume) = match (
        parse("sample volume", &row.sample_volume),
        parse("diluent volume", &row.diluent_volume),
    ) {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), _) | (_, Err(e)) => return RowOutcome::Invalid(e),
    };

    if sample_volume > 0.0 && sample_volume < min_pipette_volume {
        return RowOutcome::Infeasible(Infeasibility::BelowMinimumPipetteVolume {
            required: sample_volume,
            minimum: min_pipette_volume,
        });
    }

    RowOutcome::Given {
        sample_volume,
        diluent_volume,
    }
}

/// Ready rows as `(row, sample, diluent)`
fn ready(rows: &[RowPlan]) -> impl Iterator<Item = (&RowPlan, f64, f64)> {
    rows.iter()
        .filter_map(|r| r.outcome.volumes().map(|(s, d)| (r, s, d)))
}

fn check_supplies(config: &NormalizerConfig, rows: &[RowPlan]) -> NormResult<()> {
    let wells = ready(rows).count();

    let diluent: f64 = ready(rows).map(|(_, _, d)| d).sum();
    config.diluent.require(diluent + DILUENT_RESERVE)?;

    for addition in [&config.tcep, &config.iam].into_iter().flatten() {
        addition.tube.require(addition.needed_for(wells))?;
    }

    for n in 1..=2u8 {
        if let Some(tube) = config.control(n) {
            let drawn: f64 = ready(rows)
                .filter(|(r, _, _)| r.source == Source::Sample(SourcePosition::Control(n)))
                .map(|(_, s, _)| s)
                .sum();
            tube.require(drawn + CONTROL_RESERVE)?;
        }
    }

    let extra = config.additive_per_well();
    for (row, sample, diluent) in ready(rows) {
        let total = sample + diluent + extra;
        if total > config.max_well_capacity + 1e-9 {
            return Err(NormError::Layout(format!(
                "well {} would hold {:.1} µL, capacity is {:.1} µL",
                row.destination, total, config.max_well_capacity
            )));
        }
    }

    Ok(())
}

fn build_worklist(config: &NormalizerConfig, rows: &[RowPlan]) -> NormResult<Worklist> {
    let mut worklist = Worklist::new();
    let destinations: Vec<WellAddress> = ready(rows).map(|(r, _, _)| r.destination).collect();

    if let Some(tcep) = &config.tcep {
        let mut level = tcep.tube.level()?;
        for (i, well) in destinations.iter().enumerate() {
            push_reagent_transfer(&mut worklist, &tcep.tube, &mut level, *well, tcep.per_well, i == 0)?;
        }
    }

    let mut diluent = config.diluent.level()?;
    let mut controls: [Option<LiquidLevel>; 2] = [None, None];
    for (slot, tube) in controls.iter_mut().zip(&config.controls) {
        if let Some(tube) = tube {
            *slot = Some(tube.level()?);
        }
    }

    for (row, sample, diluent_volume) in ready(rows) {
        let height = match &row.source {
            Source::Sample(SourcePosition::Control(n)) => match controls
                .get_mut(usize::from(*n).wrapping_sub(1))
                .and_then(Option::as_mut)
            {
                Some(level) => Some(level.draw(sample)?),
                None => None,
            },
            _ => None,
        };
        push_sample_transfer(
            &mut worklist,
            &config.handling,
            row.source.clone(),
            row.destination,
            sample,
            height,
        );
        push_reagent_transfer(&mut worklist, &config.diluent, &mut diluent, row.destination, diluent_volume, true)?;
    }

    if let Some(iam) = &config.iam {
        worklist.push(TransferStep::Home);
        worklist.push(TransferStep::Pause {
            message: REDUCTION_PAUSE.to_string(),
        });
        let mut level = iam.tube.level()?;
        for well in &destinations {
            push_reagent_transfer(&mut worklist, &iam.tube, &mut level, *well, iam.per_well, true)?;
        }
    }

    Ok(worklist)
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Pipette, TubeSize};
    use crate::worklist::Transfer;
    use approx::assert_relative_eq;

    fn table() -> ParameterTable {
        let mut t = ParameterTable::default();
        for (k, v) in [
            ("number_of_sample_racks", "1"),
            ("sample_aspiration_height", "2"),
            ("aspiration_delay_sec", "1.5"),
            ("diluent_location", "A1"),
            ("diluent_tube_size", "15 ml"),
            ("diluent_vol", "10000"),
            ("target_quantity", "100"),
            ("target_final_volume", "200"),
        ] {
            t.insert(k, v);
        }
        t
    }

    fn row(name: &str, location: &str, dispense: &str, conc: &str, avail: &str) -> NormalizerRow {
        NormalizerRow {
            sample_name: name.to_string(),
            aspirate_tray: "1".to_string(),
            aspirate_location: location.to_string(),
            dispense_location: dispense.to_string(),
            concentration: Some(conc.to_string()),
            available_volume: Some(avail.to_string()),
            sample_volume: None,
            diluent_volume: None,
        }
    }

    fn transfers(plan: &ProtocolPlan) -> Vec<&Transfer> {
        plan.worklist.transfers().collect()
    }

    #[test]
    fn test_config_from_table() {
        let config = NormalizerConfig::from_table(&table()).unwrap();
        assert_eq!(config.sample_racks, 1);
        assert_eq!(config.diluent.tube, TubeSize::FifteenMl);
        assert!(config.tcep.is_none() && config.iam.is_none());
        assert_eq!(config.assay.as_ref().unwrap().target, Target::Quantity(100.0));
    }

    #[test]
    fn test_both_targets_rejected() {
        let mut t = table();
        t.insert("target_concentration", "0.5");
        assert!(NormalizerConfig::from_table(&t).is_err());
    }

    #[test]
    fn test_calculated_rows_and_order() {
        let config = NormalizerConfig::from_table(&table()).unwrap();
        let rows = vec![
            row("s1", "A1", "A1", "2.0", "100"),
            row("s2", "A2", "B1", "10.0", "100"),
        ];
        let plan = plan_normalizer(&config, &rows).unwrap();
        assert_eq!(plan.ready_count(), 2);

        let t = transfers(&plan);
        // s1: 50 µL sample (P300) then 150 µL diluent; s2: 10 µL (P20) then 190 µL
        assert_eq!(t.len(), 4);
        assert_eq!((t[0].pipette, t[0].volume), (Pipette::P300, 50.0));
        assert_eq!(t[0].delay_secs, 1.5);
        assert_eq!(t[0].aspirate_height, 2.0);
        assert_relative_eq!(t[1].volume, 150.0);
        assert_eq!((t[2].pipette, t[2].volume), (Pipette::P20, 10.0));
        assert_eq!(t[3].destination.to_string(), "B1");
        assert!(t.iter().all(|t| t.new_tip));
    }

    #[test]
    fn test_infeasible_row_is_skipped() {
        let config = NormalizerConfig::from_table(&table()).unwrap();
        let rows = vec![
            row("dilute", "A1", "A1", "0.05", "1000"),
            row("ok", "A2", "A2", "1.0", "500"),
        ];
        let plan = plan_normalizer(&config, &rows).unwrap();

        assert_eq!(plan.skipped_count(), 1);
        assert_eq!(plan.rows[0].outcome.status(), "insufficient_sample");
        assert!(transfers(&plan).iter().all(|t| t.destination.to_string() == "A2"));
    }

    #[test]
    fn test_given_volumes() {
        let mut t = table();
        t.insert("target_quantity", "");
        let config = NormalizerConfig::from_table(&t).unwrap();
        assert!(config.assay.is_none());

        let mut r = row("s1", "A1", "A1", "", "");
        r.concentration = None;
        r.sample_volume = Some("25".to_string());
        r.diluent_volume = Some("175".to_string());
        let mut tiny = r.clone();
        tiny.dispense_location = "A2".to_string();
        tiny.sample_volume = Some("0.5".to_string());

        let plan = plan_normalizer(&config, &[r, tiny]).unwrap();
        assert_eq!(plan.rows[0].outcome.volumes(), Some((25.0, 175.0)));
        assert_eq!(plan.rows[1].outcome.status(), "below_minimum_pipette_volume");
    }

    #[test]
    fn test_concentration_row_without_target_is_fatal() {
        let mut t = table();
        t.insert("target_quantity", "");
        let config = NormalizerConfig::from_table(&t).unwrap();
        let err = plan_normalizer(&config, &[row("s1", "A1", "A1", "2", "100")]).unwrap_err();
        assert!(matches!(err, NormError::MissingParameter(_)));
    }

    #[test]
    fn test_duplicate_dispense_well_is_fatal() {
        let config = NormalizerConfig::from_table(&table()).unwrap();
        let rows = vec![row("s1", "A1", "A1", "2", "100"), row("s2", "A2", "a01", "2", "100")];
        assert!(matches!(plan_normalizer(&config, &rows), Err(NormError::Layout(_))));
    }

    #[test]
    fn test_diluent_shortfall_is_fatal() {
        let mut t = table();
        t.insert("diluent_vol", "200");
        let config = NormalizerConfig::from_table(&t).unwrap();
        // 150 µL diluent + 100 µL reserve > 200 µL
        let err = plan_normalizer(&config, &[row("s1", "A1", "A1", "2", "100")]).unwrap_err();
        assert!(matches!(err, NormError::InsufficientReagent { .. }));
    }

    #[test]
    fn test_tcep_and_iam_passes() {
        let mut t = table();
        for (k, v) in [
            ("add_tcep", "yes"),
            ("tcep_location", "A1"),
            ("tcep_tube_size", "2 ml"),
            ("tcep_vol", "500"),
            ("tcep_vol_perWell", "10"),
            ("add_iam", "yes"),
            ("iam_location", "A2"),
            ("iam_tube_size", "2 ml"),
            ("iam_vol", "500"),
            ("iam_vol_perWell", "25"),
        ] {
            t.insert(k, v);
        }
        let config = NormalizerConfig::from_table(&t).unwrap();
        let rows = vec![row("s1", "A1", "A1", "2", "100"), row("s2", "A2", "A2", "2", "100")];
        let plan = plan_normalizer(&config, &rows).unwrap();
        let steps = plan.worklist.steps();

        // 2 TCEP + 2 × (sample + diluent) + home + pause + 2 IAM
        assert_eq!(steps.len(), 10);
        let TransferStep::Transfer(first) = &steps[0] else { panic!("expected a transfer") };
        let TransferStep::Transfer(second) = &steps[1] else { panic!("expected a transfer") };
        assert_eq!(first.source.to_string(), "TCEP/enolase:A1");
        assert!(first.new_tip && !second.new_tip);
        assert_eq!(steps[6], TransferStep::Home);
        assert!(matches!(steps[7], TransferStep::Pause { .. }));
        let TransferStep::Transfer(iam) = &steps[9] else { panic!("expected a transfer") };
        assert!(iam.new_tip);
        assert_eq!(iam.pipette, Pipette::P300);
    }

    #[test]
    fn test_tcep_shortfall_is_fatal() {
        let mut t = table();
        for (k, v) in [
            ("add_tcep", "yes"),
            ("tcep_location", "A1"),
            ("tcep_tube_size", "2 ml"),
            ("tcep_vol", "30"),
            ("tcep_vol_perWell", "10"),
        ] {
            t.insert(k, v);
        }
        let config = NormalizerConfig::from_table(&t).unwrap();
        // 1 × 10 + 20 = 30 is just enough, 2 wells are not
        assert!(plan_normalizer(&config, &[row("s1", "A1", "A1", "2", "100")]).is_ok());
        let rows = vec![row("s1", "A1", "A1", "2", "100"), row("s2", "A2", "A2", "2", "100")];
        assert!(matches!(plan_normalizer(&config, &rows), Err(NormError::InsufficientReagent { .. })));
    }

    #[test]
    fn test_controls() {
        let mut t = table();
        for (k, v) in [
            ("control_1", "yes"),
            ("cntl1_location", "B1"),
            ("cntl1_tube_size", "2 ml"),
            ("cntl1_vol", "180"),
        ] {
            t.insert(k, v);
        }
        let config = NormalizerConfig::from_table(&t).unwrap();

        // 100 µg at 2 µg/µL = 50 µL of control, 50 + 100 ≤ 180
        let plan = plan_normalizer(&config, &[row("ctrl", "cntl1", "A1", "2", "150")]).unwrap();
        assert_eq!(transfers(&plan)[0].source.to_string(), "CNTL1");
        assert_eq!(transfers(&plan)[0].aspirate_height, 1.0);

        let err = plan_normalizer(&config, &[row("ctrl", "CNTL2", "A1", "2", "150")]).unwrap_err();
        assert!(matches!(err, NormError::Layout(_)));

        let rows = vec![row("c1", "CNTL1", "A1", "2", "150"), row("c2", "CNTL1", "A2", "2", "150")];
        assert!(matches!(plan_normalizer(&config, &rows), Err(NormError::InsufficientReagent { .. })));
    }

    #[test]
    fn test_overfilled_well_is_fatal() {
        let mut t = table();
        t.insert("target_final_volume", "1000");
        t.insert("max_well_capacity", "1000");
        t.insert("diluent_vol", "14000");
        for (k, v) in [
            ("add_iam", "yes"),
            ("iam_location", "A2"),
            ("iam_tube_size", "2 ml"),
            ("iam_vol", "500"),
            ("iam_vol_perWell", "25"),
        ] {
            t.insert(k, v);
        }
        let config = NormalizerConfig::from_table(&t).unwrap();
        let err = plan_normalizer(&config, &[row("s1", "A1", "A1", "2", "100")]).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
