mod commands;

use clap::{ArgAction, Parser};
use rsm_core::RsmError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let compatibility_error = error.as_rsm_error();
            eprintln!("{}", compatibility_error.diagnostic_line());
            if let Some(summary_line) = compatibility_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            compatibility_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("xrd-rsm".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            let context = commands::CommandContext::load(cli.config.as_deref())?;
            dispatch_parsed(cli.command, &context)
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

/// `RUST_LOG` wins; otherwise `-v` raises the default level from `warn`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a second init in the same process keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "xrd-rsm",
    version,
    about = "Reciprocal-space mapping for area-detector diffraction scans"
)]
struct Cli {
    /// Pipeline configuration JSON
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// List the scans of a project
    Scans(commands::ScansArgs),
    /// Load and map one scan to reciprocal space
    Map(commands::MapArgs),
    /// Load, map and grid one scan
    Grid(commands::GridArgs),
}

fn dispatch_parsed(
    command: CliCommand,
    context: &commands::CommandContext,
) -> Result<i32, CliError> {
    match command {
        CliCommand::Scans(args) => commands::run_scans_command(context, args),
        CliCommand::Map(args) => commands::run_map_command(context, args),
        CliCommand::Grid(args) => commands::run_grid_command(context, args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(RsmError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RsmError> for CliError {
    fn from(error: RsmError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_rsm_error(&self) -> RsmError {
        match self {
            Self::Usage(message) => RsmError::invalid_config("CONFIG.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => RsmError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
