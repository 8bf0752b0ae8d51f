//! Command-line argument parsing.
//!
//! Arguments are parsed by hand; the binary only has a handful of options.
//! `NORM_RS_*` environment variables supply defaults that explicit flags
//! override.

use std::env;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
norm-rs: protein normalization and BCA plate planning for the OT-2

USAGE:
    norm-rs <PROTOCOL> <PARAMS.csv> [OPTIONS]

PROTOCOLS:
    normalize   Bring every sample to a common concentration or quantity
    bca         Dilute samples and standards into a BCA assay plate

OPTIONS:
    --sheet=PATH      Sample sheet (default: inputCSVfilename in PARAMS.csv)
    --plans=PATH      Write the per-well plan table (CSV)
    --worklist=PATH   Write the liquid handling steps (CSV)
    --european        Semicolon delimiter, decimal comma
    --precision=N     Decimal places in exported volumes (default: 2)
    --strict          Exit with an error if any well is skipped
    --help, -h        Show this help message
    --version, -V     Show version

ENVIRONMENT VARIABLES:
    NORM_RS_PLANS      Default for --plans
    NORM_RS_WORKLIST   Default for --worklist
    RUST_LOG           Log filter (default: info)";

/// Protocol selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Normalize,
    Bca,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalize => write!(f, "normalizer"),
            Self::Bca => write!(f, "bca"),
        }
    }
}

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    pub protocol: Protocol,
    pub params: PathBuf,
    /// Overrides the sheet named in the parameter file
    pub sheet: Option<PathBuf>,
    pub plans: Option<PathBuf>,
    pub worklist: Option<PathBuf>,
    pub european: bool,
    pub precision: Option<usize>,
    /// Treat any skipped well as a failure
    pub strict: bool,
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CliError {
    #[error("unknown protocol '{0}' (expected 'normalize' or 'bca')")]
    UnknownProtocol(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid value for {flag}: '{value}'")]
    InvalidValue { flag: &'static str, value: String },

    #[error("missing argument: {0}")]
    Missing(&'static str),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}

impl Command {
    /// Parse the process arguments and environment.
    pub fn parse() -> Result<Self, CliError> {
        Self::parse_from(env::args().skip(1), |key| env::var(key).ok())
    }

    /// Parse `args` (program name excluded), reading defaults through `var`.
    pub fn parse_from<I, F>(args: I, var: F) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut positional = Vec::new();
        let mut sheet = None;
        let mut plans = var("NORM_RS_PLANS").map(PathBuf::from);
        let mut worklist = var("NORM_RS_WORKLIST").map(PathBuf::from);
        let mut european = false;
        let mut precision = None;
        let mut strict = false;

        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Self::Help),
                "--version" | "-V" => return Ok(Self::Version),
                "--strict" => strict = true,
                "--european" => european = true,
                other => {
                    if let Some(val) = other.strip_prefix("--sheet=") {
                        sheet = Some(path_value("--sheet", val)?);
                    } else if let Some(val) = other.strip_prefix("--plans=") {
                        plans = Some(path_value("--plans", val)?);
                    } else if let Some(val) = other.strip_prefix("--worklist=") {
                        worklist = Some(path_value("--worklist", val)?);
                    } else if let Some(val) = other.strip_prefix("--precision=") {
                        let n = val.parse().map_err(|_| CliError::InvalidValue {
                            flag: "--precision",
                            value: val.to_string(),
                        })?;
                        precision = Some(n);
                    } else if other.starts_with('-') {
                        return Err(CliError::UnknownOption(other.to_string()));
                    } else {
                        positional.push(other.to_string());
                    }
                }
            }
        }

        let mut positional = positional.into_iter();
        let protocol = match positional.next().as_deref() {
            Some("normalize" | "normalizer") => Protocol::Normalize,
            Some("bca") => Protocol::Bca,
            Some(other) => return Err(CliError::UnknownProtocol(other.to_string())),
            None => return Err(CliError::Missing("PROTOCOL")),
        };
        let params = positional
            .next()
            .map(PathBuf::from)
            .ok_or(CliError::Missing("PARAMS.csv"))?;
        if let Some(extra) = positional.next() {
            return Err(CliError::Unexpected(extra));
        }

        Ok(Self::Run(Opts {
            protocol,
            params,
            sheet,
            plans,
            worklist,
            european,
            precision,
            strict,
        }))
    }
}

fn path_value(flag: &'static str, value: &str) -> Result<PathBuf, CliError> {
    if value.is_empty() {
        return Err(CliError::InvalidValue { flag, value: String::new() });
    }
    Ok(PathBuf::from(value))
}
