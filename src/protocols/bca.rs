//! BCA assay plate
//!
//! Every well gets the same volume of sample, diluted by the factor given in
//! the sheet (1 = neat, up to 25), on top of the BCA working reagent.
//! Optionally a standard stock is laid out as a calibration ladder and a few
//! diluent-only blanks are added after the samples.
//!
//! Sample volumes come from
//! [`plan_dilution_factor`](crate::calculator::plan_dilution_factor) with a
//! relative stock concentration, so a 1:4 dilution of a 20 µL well is 5 µL of
//! sample and 15 µL of diluent.

use std::path::Path;

use crate::calculator::dilution::RELATIVE_CONCENTRATION;
use crate::calculator::{plan_dilution_factor, plan_standards, DilutionLadder, StandardStock};
use crate::deck::{LabwareFormat, TubeSize, WellAddress};
use crate::error::{InputError, NormError, NormResult};
use crate::protocols::{
    destination_wells, push_reagent_transfer, push_sample_transfer, read_sheet_from_path,
    sample_racks, sheet_path, source_positions, BcaRow, ParameterTable, ProtocolPlan,
    ReagentAddition, ReagentTube, RowOutcome, RowPlan, SampleHandling,
};
use crate::sample::parameters::{DEFAULT_MIN_PIPETTE_VOLUME, DEFAULT_VOLUME_RESOLUTION};
use crate::sample::record::{check_positive, parse_number};
use crate::sample::{AssayParameters, SampleRecord, Target};
use crate::worklist::{Source, Worklist};

/// Highest dilution factor the plate layout supports
pub const MAX_DILUTION: f64 = 25.0;

/// Working volume of a BCA plate well (µL)
pub const BCA_WELL_CAPACITY: f64 = 200.0;

// =================================================================================================
// Configuration
// =================================================================================================

/// Calibration ladder laid out from a standard stock
#[derive(Debug, Clone, PartialEq)]
pub struct StandardSettings {
    pub stock: ReagentTube,
    /// Stock concentration (µg/µL)
    pub concentration: f64,
    pub ladder: DilutionLadder,
}

impl StandardSettings {
    fn stock(&self) -> StandardStock {
        StandardStock::new(self.stock.name.clone(), self.concentration, self.stock.volume)
    }

    /// Every ladder step must be pipettable from the stock into one well
    fn check_ladder(&self, params: &AssayParameters) -> NormResult<()> {
        let steps = plan_standards(&self.stock(), &self.ladder, params)
            .map_err(|e| NormError::invalid("standard_conc", e.to_string()))?;

        let failed: Vec<String> = steps
            .iter()
            .filter_map(|step| {
                step.outcome
                    .as_ref()
                    .err()
                    .map(|reason| format!("{} µg/µL ({})", step.concentration, reason.code()))
            })
            .collect();

        if !failed.is_empty() {
            return Err(NormError::invalid(
                "standard_ladder",
                format!(
                    "cannot lay out {} from a {} µg/µL stock in {} µL wells",
                    failed.join(", "),
                    self.concentration,
                    params.target_final_volume
                ),
            ));
        }
        Ok(())
    }
}

/// BCA run settings, read from the parameter file
#[derive(Debug, Clone, PartialEq)]
pub struct BcaConfig {
    pub sample_racks: u8,
    pub handling: SampleHandling,
    /// Sample plus diluent per well (µL)
    pub sample_volume: f64,
    /// BCA working reagent; `None` when it is added by hand
    pub reagent: Option<ReagentAddition>,
    /// Required as soon as one row is diluted
    pub diluent: Option<ReagentTube>,
    pub standards: Option<StandardSettings>,
    pub blank_wells: u32,
    /// Calculator settings for sample and standard wells
    pub params: AssayParameters,
}

impl BcaConfig {
    pub fn from_table(table: &ParameterTable) -> NormResult<Self> {
        let sample_volume = table.number("sample_vol_perWell")?;
        let max_well_capacity = table.number_or("max_well_capacity", BCA_WELL_CAPACITY)?;

        let params = AssayParameters::new(Target::Concentration(RELATIVE_CONCENTRATION), sample_volume)
            .min_pipette_volume(table.number_or("min_pipette_vol", DEFAULT_MIN_PIPETTE_VOLUME)?)
            .max_well_capacity(max_well_capacity)
            .volume_resolution(table.number_or("volume_resolution", DEFAULT_VOLUME_RESOLUTION)?);
        params.validate()?;

        let reagent = ReagentAddition::from_table(table, "aspirate_reagent", "BCA reagent", "reagent")?;
        if let Some(reagent) = &reagent {
            falcon_only("reagent_tube_size", reagent.tube.tube)?;
            if sample_volume + reagent.per_well > max_well_capacity {
                return Err(NormError::invalid(
                    "reagent_vol_perWell",
                    format!(
                        "{} µL sample + {} µL reagent overfills a {} µL well",
                        sample_volume, reagent.per_well, max_well_capacity
                    ),
                ));
            }
        }

        let diluent = if table.contains("diluent_location") {
            let tube = ReagentTube::from_table(table, "diluent", "diluent")?;
            falcon_only("diluent_tube_size", tube.tube)?;
            Some(tube)
        } else {
            None
        };

        let standards = if table.flag_or("add_standards", false)? {
            let concentration = table.number("standard_conc")?;
            check_positive("standard_conc", concentration)
                .map_err(|e| NormError::invalid("standard_conc", e.to_string()))?;
            let ladder = match table.optional_text("standard_ladder") {
                Some(raw) => parse_ladder(raw)?,
                None => DilutionLadder::bca_standards(),
            };
            let settings = StandardSettings {
                stock: ReagentTube::from_table(table, "standard", "standard")?,
                concentration,
                ladder,
            };
            settings.check_ladder(&params)?;
            Some(settings)
        } else {
            None
        };

        Ok(Self {
            sample_racks: sample_racks(table)?,
            handling: SampleHandling::from_table(table)?,
            sample_volume,
            reagent,
            diluent,
            standards,
            blank_wells: table.integer_or("blank_wells", 0)?,
            params,
        })
    }
}

fn falcon_only(name: &str, tube: TubeSize) -> NormResult<()> {
    if tube == TubeSize::TwoMl {
        return Err(NormError::invalid(name, "must be a 15 ml or 50 ml Falcon tube"));
    }
    Ok(())
}

/// `2; 1.5; 1` or `2 1.5 1`
fn parse_ladder(raw: &str) -> NormResult<DilutionLadder> {
    let values = raw
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| parse_number("standard_ladder", s))
        .collect::<Result<Vec<f64>, InputError>>()
        .and_then(DilutionLadder::explicit);
    values.map_err(|e| NormError::invalid("standard_ladder", e.to_string()))
}

// =================================================================================================
// Planning
// =================================================================================================

/// Plan a BCA sheet, its standards and blanks, and build the worklist
///
/// # Errors
///
/// Layout problems, a dilution outside 1–25, dilutions without a diluent
/// tube, not enough free wells for standards and blanks, and reagent,
/// diluent or standard shortfalls are fatal.
pub fn plan_bca(config: &BcaConfig, rows: &[BcaRow]) -> NormResult<ProtocolPlan> {
    let wells = destination_wells(rows.iter().map(|r| r.dispense_location.as_str()))?;
    let positions = source_positions(
        rows.iter()
            .map(|r| (r.aspirate_tray.as_str(), r.aspirate_location.as_str())),
        config.sample_racks,
        false,
    )?;

    let mut planned = Vec::new();
    for (i, ((row, well), position)) in rows.iter().zip(&wells).zip(positions).enumerate() {
        let dilution = parse_dilution(i + 1, &row.dilution)?;
        if dilution > 1.0 && config.diluent.is_none() {
            return Err(NormError::MissingParameter(format!(
                "diluent_location (row {} is diluted 1:{})",
                i + 1,
                dilution
            )));
        }

        let outcome = match sample_record(row, config.sample_volume)
            .and_then(|record| plan_dilution_factor(&record, dilution, &config.params))
        {
            Ok(Ok(plan)) => RowOutcome::Calculated(plan),
            Ok(Err(reason)) => RowOutcome::Infeasible(reason),
            Err(e) => RowOutcome::Invalid(e),
        };
        if let Some(reason) = outcome.reason() {
            log::warn!("row {} '{}' skipped: {}", i + 1, row.sample_name, reason);
        }

        planned.push(RowPlan {
            row: i + 1,
            name: row.sample_name.clone(),
            source: Source::Sample(position),
            destination: *well,
            outcome,
        });
    }

    let generated = generated_rows(config, rows.len())?;
    let free = free_wells(&wells);
    if generated.len() > free.len() {
        return Err(NormError::Layout(format!(
            "{} standard and blank wells do not fit in the {} free wells",
            generated.len(),
            free.len()
        )));
    }
    for (mut row, well) in generated.into_iter().zip(free) {
        row.destination = well;
        planned.push(row);
    }

    check_supplies(config, &planned)?;
    let worklist = build_worklist(config, &planned)?;

    let plan = ProtocolPlan { rows: planned, worklist };
    log::info!(
        "BCA plate: {} wells planned, {} rows skipped, {} steps",
        plan.ready_count(),
        plan.skipped_count(),
        plan.worklist.len()
    );
    Ok(plan)
}

/// Read the parameter file and its sheet, then plan
///
/// `sheet` overrides the `inputCSVfilename` parameter.
pub fn plan_bca_files(params_path: &Path, sheet: Option<&Path>) -> NormResult<ProtocolPlan> {
    let table = ParameterTable::from_path(params_path)?;
    let config = BcaConfig::from_table(&table)?;
    let sheet = match sheet {
        Some(path) => path.to_path_buf(),
        None => sheet_path(&table, params_path)?,
    };
    let rows: Vec<BcaRow> = read_sheet_from_path(&sheet)?;
    plan_bca(&config, &rows)
}

fn parse_dilution(row: usize, raw: &str) -> NormResult<f64> {
    let dilution = parse_number("dilution", raw).map_err(|source| NormError::Row { row, source })?;
    if !(1.0..=MAX_DILUTION).contains(&dilution) {
        return Err(NormError::Row {
            row,
            source: InputError::Inconsistent(format!(
                "dilution {dilution} is outside 1–{MAX_DILUTION}"
            )),
        });
    }
    Ok(dilution)
}

/// Sample as seen by the calculator; the well volume is all it can ever draw
fn sample_record(row: &BcaRow, well_volume: f64) -> Result<SampleRecord, InputError> {
    if row.sample_name.is_empty() {
        return Err(InputError::Missing { field: "sample name" });
    }
    let concentration = match row.concentration.as_deref() {
        Some(raw) => check_positive("concentration", parse_number("concentration", raw)?)?,
        None => RELATIVE_CONCENTRATION,
    };
    SampleRecord::new(row.sample_name.as_str(), concentration, well_volume)
}

/// Standard and blank rows, destinations still unassigned
fn generated_rows(config: &BcaConfig, sheet_rows: usize) -> NormResult<Vec<RowPlan>> {
    let mut generated = Vec::new();
    let placeholder = WellAddress::new(0, 1);

    if let Some(standards) = &config.standards {
        let steps = plan_standards(&standards.stock(), &standards.ladder, &config.params)
            .map_err(|e| NormError::invalid("standard_vol", e.to_string()))?;

        for step in steps {
            let outcome = match step.outcome {
                Ok(plan) => RowOutcome::Calculated(plan),
                Err(reason) => {
                    log::warn!("standard {} µg/µL skipped: {}", step.concentration, reason);
                    RowOutcome::Infeasible(reason)
                }
            };
            generated.push(RowPlan {
                row: sheet_rows + generated.len() + 1,
                name: format!("standard {} µg/µL", step.concentration),
                source: standards.stock.source(),
                destination: placeholder,
                outcome,
            });
        }
    }

    if config.blank_wells > 0 {
        let diluent = config
            .diluent
            .as_ref()
            .ok_or_else(|| NormError::MissingParameter("diluent_location (blank wells)".to_string()))?;
        for k in 1..=config.blank_wells {
            generated.push(RowPlan {
                row: sheet_rows + generated.len() + 1,
                name: format!("blank {k}"),
                source: diluent.source(),
                destination: placeholder,
                outcome: RowOutcome::Given {
                    sample_volume: 0.0,
                    diluent_volume: config.sample_volume,
                },
            });
        }
    }

    Ok(generated)
}

/// Plate wells not used by the sheet, in column-major order
fn free_wells(used: &[WellAddress]) -> Vec<WellAddress> {
    let format = LabwareFormat::Plate96;
    (1..=format.columns())
        .flat_map(|column| (0..format.rows()).map(move |row| WellAddress::new(row, column)))
        .filter(|well| !used.contains(well))
        .collect()
}

fn ready(rows: &[RowPlan]) -> impl Iterator<Item = (&RowPlan, f64, f64)> {
    rows.iter()
        .filter_map(|r| r.outcome.volumes().map(|(s, d)| (r, s, d)))
}

/// Reagent and diluent tubes keep one more aspiration in reserve: a
/// well's worth of reagent, a well's sample volume of diluent.
fn check_supplies(config: &BcaConfig, rows: &[RowPlan]) -> NormResult<()> {
    let wells = ready(rows).count();

    if let Some(reagent) = &config.reagent {
        if wells > 0 {
            reagent.tube.require((wells + 1) as f64 * reagent.per_well)?;
        }
    }

    let diluent: f64 = ready(rows).map(|(_, _, d)| d).sum();
    if diluent > 0.0 {
        match &config.diluent {
            Some(tube) => tube.require(diluent + config.sample_volume)?,
            None => return Err(NormError::MissingParameter("diluent_location".to_string())),
        }
    }

    if let Some(standards) = &config.standards {
        let stock_source = standards.stock.source();
        let drawn: f64 = ready(rows)
            .filter(|(r, _, _)| r.source == stock_source)
            .map(|(_, s, _)| s)
            .sum();
        standards.stock.require(drawn)?;
    }

    Ok(())
}

fn build_worklist(config: &BcaConfig, rows: &[RowPlan]) -> NormResult<Worklist> {
    let mut worklist = Worklist::new();

    if let Some(reagent) = &config.reagent {
        let mut level = reagent.tube.level()?;
        for (i, (row, _, _)) in ready(rows).enumerate() {
            push_reagent_transfer(&mut worklist, &reagent.tube, &mut level, row.destination, reagent.per_well, i == 0)?;
        }
    }

    let mut diluent = config.diluent.as_ref().map(ReagentTube::level).transpose()?;
    let mut stock = config
        .standards
        .as_ref()
        .map(|s| s.stock.level().map(|level| (s, level)))
        .transpose()?;

    for (row, sample, diluent_volume) in ready(rows) {
        match (&row.source, stock.as_mut()) {
            (Source::Sample(_), _) => push_sample_transfer(
                &mut worklist,
                &config.handling,
                row.source.clone(),
                row.destination,
                sample,
                None,
            ),
            (Source::Reagent { .. }, Some((standards, level))) if row.source == standards.stock.source() => {
                push_reagent_transfer(&mut worklist, &standards.stock, level, row.destination, sample, true)?
            }
            _ => {}
        }

        if diluent_volume > 0.0 {
            if let (Some(tube), Some(level)) = (&config.diluent, diluent.as_mut()) {
                push_reagent_transfer(&mut worklist, tube, level, row.destination, diluent_volume, true)?;
            }
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
    use crate::deck::Pipette;
    use crate::worklist::Transfer;
    use approx::assert_relative_eq;

    fn table() -> ParameterTable {
        let mut t = ParameterTable::default();
        for (k, v) in [
            ("number_of_sample_racks", "1"),
            ("sample_vol_perWell", "20"),
            ("sample_aspiration_height", "1"),
            ("aspirate_reagent", "yes"),
            ("reagent_vol_perWell", "180"),
            ("reagent_vol", "20000"),
            ("reagent_tube_size", "50 ml"),
            ("reagent_location", "A3"),
            ("diluent_vol", "10000"),
            ("diluent_tube_size", "15 ml"),
            ("diluent_location", "A1"),
        ] {
            t.insert(k, v);
        }
        t
    }

    fn row(name: &str, location: &str, dilution: &str, dispense: &str) -> BcaRow {
        BcaRow {
            sample_name: name.to_string(),
            aspirate_tray: "1".to_string(),
            aspirate_location: location.to_string(),
            dilution: dilution.to_string(),
            dispense_location: dispense.to_string(),
            concentration: None,
        }
    }

    fn transfers(plan: &ProtocolPlan) -> Vec<&Transfer> {
        plan.worklist.transfers().collect()
    }

    #[test]
    fn test_dilution_volumes() {
        let config = BcaConfig::from_table(&table()).unwrap();
        let rows = vec![row("s1", "A1", "1", "A1"), row("s2", "A2", "4", "B1")];
        let plan = plan_bca(&config, &rows).unwrap();

        assert_eq!(plan.rows[0].outcome.volumes(), Some((20.0, 0.0)));
        let (sample, diluent) = plan.rows[1].outcome.volumes().unwrap();
        assert_relative_eq!(sample, 5.0);
        assert_relative_eq!(diluent, 15.0);
    }

    #[test]
    fn test_reagent_pass_comes_first_with_one_tip() {
        let config = BcaConfig::from_table(&table()).unwrap();
        let rows = vec![row("s1", "A1", "1", "A1"), row("s2", "A2", "4", "B1")];
        let plan = plan_bca(&config, &rows).unwrap();
        let t = transfers(&plan);

        // 2 reagent + s1 sample + s2 sample + s2 diluent
        assert_eq!(t.len(), 5);
        assert_eq!(t[0].source.to_string(), "BCA reagent:A3");
        assert!(t[0].new_tip && !t[1].new_tip);
        assert_eq!((t[2].pipette, t[2].volume), (Pipette::P20, 20.0));
        assert_eq!(t[4].source.to_string(), "diluent:A1");
    }

    #[test]
    fn test_dilution_out_of_range_is_fatal() {
        let config = BcaConfig::from_table(&table()).unwrap();
        for bad in ["0.5", "30", "ten"] {
            let err = plan_bca(&config, &[row("s1", "A1", bad, "A1")]).unwrap_err();
            assert!(matches!(err, NormError::Row { row: 1, .. }), "{bad}: {err}");
        }
    }

    #[test]
    fn test_dilution_without_diluent_is_fatal() {
        let mut t = table();
        t.insert("diluent_location", "");
        let config = BcaConfig::from_table(&t).unwrap();
        assert!(config.diluent.is_none());

        assert!(plan_bca(&config, &[row("s1", "A1", "1", "A1")]).is_ok());
        let err = plan_bca(&config, &[row("s1", "A1", "2", "A1")]).unwrap_err();
        assert!(matches!(err, NormError::MissingParameter(_)));
    }

    #[test]
    fn test_reagent_shortfall_is_fatal() {
        let mut t = table();
        t.insert("reagent_vol", "300");
        let config = BcaConfig::from_table(&t).unwrap();
        let rows = vec![row("s1", "A1", "1", "A1"), row("s2", "A2", "1", "A2")];
        assert!(matches!(plan_bca(&config, &rows), Err(NormError::InsufficientReagent { .. })));
    }

    #[test]
    fn test_reagent_tube_keeps_one_well_in_reserve() {
        let rows = vec![row("s1", "A1", "1", "A1"), row("s2", "A2", "1", "A2")];

        // 2 × 180 µL drawn: the tube must hold a third well's worth
        let mut t = table();
        t.insert("reagent_vol", "360");
        let config = BcaConfig::from_table(&t).unwrap();
        match plan_bca(&config, &rows) {
            Err(NormError::InsufficientReagent { needed, available, .. }) => {
                assert_relative_eq!(needed, 540.0);
                assert_relative_eq!(available, 360.0);
            }
            other => panic!("expected InsufficientReagent, got {:?}", other),
        }

        t.insert("reagent_vol", "540");
        let config = BcaConfig::from_table(&t).unwrap();
        assert!(plan_bca(&config, &rows).is_ok());
    }

    #[test]
    fn test_diluent_tube_keeps_one_sample_volume_in_reserve() {
        // 1:4 → 15 µL diluent per well, 20 µL left behind
        let rows = vec![row("s1", "A1", "4", "A1"), row("s2", "A2", "4", "A2")];

        let mut t = table();
        t.insert("diluent_vol", "49");
        let config = BcaConfig::from_table(&t).unwrap();
        assert!(matches!(plan_bca(&config, &rows), Err(NormError::InsufficientReagent { .. })));

        t.insert("diluent_vol", "50");
        let config = BcaConfig::from_table(&t).unwrap();
        assert!(plan_bca(&config, &rows).is_ok());
    }

    #[test]
    fn test_two_ml_reagent_tube_rejected() {
        let mut t = table();
        t.insert("reagent_tube_size", "2 ml");
        assert!(BcaConfig::from_table(&t).is_err());
    }

    #[test]
    fn test_overfilled_well_rejected() {
        let mut t = table();
        t.insert("reagent_vol_perWell", "190");
        assert!(BcaConfig::from_table(&t).is_err());
    }

    #[test]
    fn test_large_dilution_below_pipette_floor_is_skipped() {
        let mut t = table();
        t.insert("min_pipette_vol", "1");
        let config = BcaConfig::from_table(&t).unwrap();
        // 20 / 25 = 0.8 µL
        let plan = plan_bca(&config, &[row("s1", "A1", "25", "A1")]).unwrap();
        assert_eq!(plan.rows[0].outcome.status(), "below_minimum_pipette_volume");
        assert!(plan.worklist.is_empty());
    }

    #[test]
    fn test_standards_and_blanks_fill_free_wells() {
        let mut t = table();
        for (k, v) in [
            ("add_standards", "yes"),
            ("standard_conc", "2"),
            ("standard_location", "B1"),
            ("standard_tube_size", "15 ml"),
            ("standard_vol", "1000"),
            ("standard_ladder", "2; 1; 0.5"),
            ("blank_wells", "2"),
        ] {
            t.insert(k, v);
        }
        let config = BcaConfig::from_table(&t).unwrap();
        let plan = plan_bca(&config, &[row("s1", "A1", "1", "A1")]).unwrap();

        assert_eq!(plan.rows.len(), 6);
        let names: Vec<&str> = plan.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(&names[1..], &["standard 2 µg/µL", "standard 1 µg/µL", "standard 0.5 µg/µL", "blank 1", "blank 2"]);

        let wells: Vec<String> = plan.rows.iter().map(|r| r.destination.to_string()).collect();
        assert_eq!(wells, ["A1", "B1", "C1", "D1", "E1", "F1"]);

        // 0.5 µg/µL standard: 5 µL stock + 15 µL diluent
        assert_eq!(plan.rows[3].outcome.volumes(), Some((5.0, 15.0)));
        assert_eq!(plan.rows[5].outcome.volumes(), Some((0.0, 20.0)));
        assert_eq!(plan.rows[1].source.to_string(), "standard:B1");
    }

    #[test]
    fn test_unreachable_ladder_steps_rejected() {
        let mut t = table();
        for (k, v) in [
            ("add_standards", "yes"),
            ("standard_conc", "2"),
            ("standard_location", "B1"),
            ("standard_tube_size", "15 ml"),
            ("standard_vol", "1000"),
        ] {
            t.insert(k, v);
        }

        // Default ladder in 20 µL wells: 0.125 µg/µL needs 1.25 µL, 0.025 µg/µL needs 0.25 µL
        match BcaConfig::from_table(&t) {
            Err(NormError::InvalidParameter { name, reason }) => {
                assert_eq!(name, "standard_ladder");
                assert!(reason.contains("0.125 µg/µL (outside_quantity_tolerance)"), "{reason}");
                assert!(reason.contains("0.025 µg/µL (below_minimum_pipette_volume)"), "{reason}");
                assert!(!reason.contains("0.25 µg/µL ("), "{reason}");
            }
            other => panic!("expected InvalidParameter, got {:?}", other),
        }

        t.insert("standard_ladder", "2; 1.5; 1; 0.75; 0.5; 0.25");
        assert!(BcaConfig::from_table(&t).is_ok());
    }

    #[test]
    fn test_ladder_parsing() {
        assert_eq!(parse_ladder("2 1.5;1").unwrap().concentrations(), vec![2.0, 1.5, 1.0]);
        assert!(parse_ladder("2; zero").is_err());
        assert!(parse_ladder(" ; ").is_err());
    }
}
