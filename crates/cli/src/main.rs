// cdmload - load statistical-table classification sheets into the CDM warehouse

mod batch;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_STORAGE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(
    name = "cdmload",
    about = "Reconcile classification sheets against FAS tables and load them into the CDM warehouse",
    version
)]
#[command(long_version = long_version())]
#[command(group(ArgGroup::new("input").required(true).args(["file", "folder"])))]
pub struct Cli {
    /// Classification sheet to load (.csv, .xlsx)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Load every sheet in a folder, in file-name order
    #[arg(long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// Settings file [default: <config dir>/cdmload/cdmload.toml]
    #[arg(long, short = 'c', env = "CDMLOAD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Process in memory and leave the warehouse database untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Write table_<code>.json exports to this directory (overrides [output] dir)
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, msg)
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, msg)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_STORAGE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging() {
    // RUST_LOG wins; library diagnostics arrive through the log bridge
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match batch::run(&cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            eprintln!("error: {}", message);
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
