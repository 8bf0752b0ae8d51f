//! `norm-rs` binary: plan a run, simulate it and write the tables.

use std::process::ExitCode;

use norm_rs::cli::{Command, Opts, Protocol, HELP_TEXT, VERSION};
use norm_rs::output::{CsvConfig, CsvExporter, CsvMetadata, Exporter, PlanSummary};
use norm_rs::protocols::{plan_bca_files, plan_normalizer_files, ProtocolPlan};
use norm_rs::worklist::{run, RecordingExecutor};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = match Command::parse() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            println!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("norm-rs {VERSION}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {e}\n\n{HELP_TEXT}");
            return ExitCode::from(2);
        }
    };

    match execute(&opts) {
        Ok(plan) if opts.strict && plan.skipped_count() > 0 => {
            log::error!("{} wells skipped (--strict)", plan.skipped_count());
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(opts: &Opts) -> Result<ProtocolPlan, Box<dyn std::error::Error>> {
    let plan = match opts.protocol {
        Protocol::Normalize => plan_normalizer_files(&opts.params, opts.sheet.as_deref())?,
        Protocol::Bca => plan_bca_files(&opts.params, opts.sheet.as_deref())?,
    };

    let mut executor = RecordingExecutor::default();
    let steps = run(&plan.worklist, &mut executor)?;
    log::info!("dry run complete: {steps} steps");

    println!("{}", PlanSummary::new(&opts.protocol.to_string(), &plan));

    let mut config = if opts.european { CsvConfig::european() } else { CsvConfig::default() };
    if let Some(precision) = opts.precision {
        config = config.precision(precision);
    }
    let metadata = CsvMetadata::from_protocol(&opts.protocol.to_string())
        .with_source(opts.params.display().to_string());
    let exporter = CsvExporter::new(config.with_metadata(metadata));

    if let Some(path) = &opts.plans {
        exporter.export_plans(&plan.rows, path)?;
    }
    if let Some(path) = &opts.worklist {
        if plan.worklist.is_empty() {
            log::warn!("no ready wells, {} not written", path.display());
        } else {
            exporter.export_worklist(&plan.worklist, path)?;
        }
    }

    Ok(plan)
}
