mod commands;
mod helpers;

use clap::Parser;
use xrf_core::domain::XrfError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_xrf_error();
            eprintln!("{}", error.diagnostic_line());
            eprintln!("{}", error.fatal_exit_line());
            error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "xrfit", version, about = "XRF spectrum fitting and calibration")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Fit the job's signatures to its spectrum and report intensities
    Fit(commands::FitArgs),
    /// Run unsupervised peak detection over the job's spectrum
    Peaks(commands::PeaksArgs),
    /// Build a calibration profile from the job's reference sample
    Profile(commands::ProfileArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Fit(args) => commands::run_fit_command(args),
        CliCommand::Peaks(args) => commands::run_peaks_command(args),
        CliCommand::Profile(args) => commands::run_profile_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(XrfError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<XrfError> for CliError {
    fn from(error: XrfError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_xrf_error(&self) -> XrfError {
        match self {
            Self::Usage(message) => XrfError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => XrfError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
