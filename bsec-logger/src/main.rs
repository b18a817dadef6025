mod bsec;
mod rotating_file;

use crate::bsec::{DEFAULT_COMMAND, DEFAULT_WORKDIR};
use crate::rotating_file::{RotatingFile, DEFAULT_BACKUP_COUNT};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info};
use tracing::level_filters::LevelFilter;

/// Runs the BSEC sensor-fusion binary and appends its output to a daily-rotated file.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "BSEC_COMMAND", default_value = DEFAULT_COMMAND)]
    command: PathBuf,
    /// Working directory of the BSEC binary (it keeps its state file there)
    #[arg(long, env = "BSEC_WORKDIR", default_value = DEFAULT_WORKDIR)]
    workdir: PathBuf,
    #[arg(long, env = "ENVMON_HISTORY", default_value = "bme680.csv")]
    log_file: PathBuf,
    /// Rotated files to keep
    #[arg(long, default_value_t = DEFAULT_BACKUP_COUNT)]
    backup_count: usize,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .init();

    let mut log = RotatingFile::open(&args.log_file, args.backup_count)?;
    info!("Current log period {}", log.period());
    info!(
        "Running {} in {}",
        args.command.display(),
        args.workdir.display()
    );
    let err = bsec::run(&args.command, &args.workdir, &mut log);
    error!("{}", err);
    Err(err.into())
}
