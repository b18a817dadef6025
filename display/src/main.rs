mod e_paper_display_driver;

use chrono::TimeDelta;
use clap::Parser;
use envmon_plot::{parse_trim_quantile, plot, Channel, HistoryPlot, DEFAULT_THRESHOLD};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing::level_filters::LevelFilter;

/// Plots the sensor history and pushes it to the 4.2" e-paper panel.
#[derive(Debug, Parser)]
struct Args {
    /// Live history file; rotated siblings `<file>.*` are read too
    #[arg(long, env = "ENVMON_HISTORY", default_value = "bme680.csv")]
    history: PathBuf,
    #[arg(long, default_value = "data_plot_1.png")]
    chart_file: PathBuf,
    #[arg(long, default_value = "data_plot_2.png")]
    mono_file: PathBuf,
    #[arg(long, default_value_t = 72, value_parser = clap::value_parser!(i64).range(1..))]
    hours: i64,
    #[arg(long, default_value_t = 3)]
    max_rotated: usize,
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..))]
    resample_minutes: i64,
    /// Drop samples outside the [q, 1-q] quantile band before resampling
    #[arg(long, value_parser = parse_trim_quantile)]
    trim_quantile: Option<f64>,
    #[arg(long, value_delimiter = ',', default_value = "Temp,Feucht,Druck,IAQ")]
    channels: Vec<Channel>,
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,
    /// Push an already packed 15000 byte buffer instead of plotting
    #[arg(long, conflicts_with_all = ["clear", "dry_run"])]
    image: Option<PathBuf>,
    /// Blank the panel and exit
    #[arg(long, conflicts_with = "dry_run")]
    clear: bool,
    /// Write the PNGs but leave the panel alone
    #[arg(long)]
    dry_run: bool,
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

    if args.clear {
        info!("Init driver to clear the panel");
        let mut device = e_paper_display_driver::open()?;
        device.init()?;
        device.clear()?;
        device.sleep()?;
        info!("Complete");
        return Ok(());
    }

    let packed = match &args.image {
        Some(file) => {
            info!("Reading {}", file.display());
            fs::read(file)?
        }
        None => {
            let history_plot = HistoryPlot {
                history: args.history.clone(),
                max_rotated: args.max_rotated,
                window: TimeDelta::hours(args.hours),
                resample: TimeDelta::minutes(args.resample_minutes),
                trim_quantile: args.trim_quantile,
                channels: args.channels.clone(),
                ..HistoryPlot::default()
            };
            plot(
                &history_plot,
                &args.chart_file,
                Some(args.mono_file.as_path()),
                None,
                args.threshold,
            )?
        }
    };

    if args.dry_run {
        info!("Dry run, panel untouched");
        return Ok(());
    }

    info!("Image ready. Init driver.");
    let mut device = e_paper_display_driver::open()?;
    device.init()?;
    info!("Device init. Sending image...");
    device.display(&packed)?;
    info!("Image sent. Sleeping display...");
    device.sleep()?;
    info!("Dropping device...");
    drop(device);
    info!("Complete");
    Ok(())
}
