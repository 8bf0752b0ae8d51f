//! Parameter files and sample sheets written to a temporary directory

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A parameter file and its sample sheet on disk
///
/// The directory is removed when the value is dropped.
pub struct Run {
    pub dir: TempDir,
    pub params: PathBuf,
    pub sheet: PathBuf,
}

/// Write `params` as a `variable,value` file and `sheet` next to it
///
/// `inputCSVfilename` is added unless `params` already sets it.
pub fn write_run(params: &[(&str, &str)], sheet: &str) -> Run {
    let dir = TempDir::new().unwrap();
    let params_path = dir.path().join("params.csv");
    let sheet_path = dir.path().join("samples.csv");

    let mut text = String::from("variable,value\n");
    if !params.iter().any(|(k, _)| *k == "inputCSVfilename") {
        text.push_str("inputCSVfilename,samples.csv\n");
    }
    for (key, value) in params {
        text.push_str(&format!("{key},{value}\n"));
    }

    fs::write(&params_path, text).unwrap();
    fs::write(&sheet_path, sheet).unwrap();

    Run { dir, params: params_path, sheet: sheet_path }
}

/// One tube rack, 15 ml diluent tube, 100 µg in 200 µL per well
pub fn normalizer_params() -> Vec<(&'static str, &'static str)> {
    vec![
        ("number_of_sample_racks", "1"),
        ("sample_aspiration_height", "1"),
        ("diluent_location", "A1"),
        ("diluent_tube_size", "15 ml"),
        ("diluent_vol", "10000"),
        ("target_quantity", "100"),
        ("target_final_volume", "200"),
    ]
}

/// 20 µL per well, BCA reagent from a 50 ml tube, 15 ml diluent tube
pub fn bca_params() -> Vec<(&'static str, &'static str)> {
    vec![
        ("number_of_sample_racks", "1"),
        ("sample_vol_perWell", "20"),
        ("sample_aspiration_height", "1"),
        ("aspirate_reagent", "yes"),
        ("reagent_vol_perWell", "180"),
        ("reagent_vol", "20000"),
        ("reagent_tube_size", "50 ml"),
        ("reagent_location", "A3"),
        ("diluent_location", "A1"),
        ("diluent_tube_size", "15 ml"),
        ("diluent_vol", "10000"),
    ]
}
