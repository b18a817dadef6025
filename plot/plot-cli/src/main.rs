use chrono::TimeDelta;
use clap::Parser;
use envmon_plot::{parse_trim_quantile, plot, Channel, HistoryPlot, DEFAULT_THRESHOLD};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing::level_filters::LevelFilter;

/// Renders the BSEC history to PNG without touching the panel.
#[derive(Debug, Parser)]
struct Args {
    /// Live history file; rotated siblings `<file>.*` are read too
    #[arg(long, env = "ENVMON_HISTORY", default_value = "bme680.csv")]
    history: PathBuf,
    #[arg(long, default_value = "data_plot_3.png")]
    out_file: PathBuf,
    /// Also save the two-level image the panel would show
    #[arg(long)]
    mono_file: Option<PathBuf>,
    /// Also write the packed panel buffer
    #[arg(long)]
    packed_file: Option<PathBuf>,
    #[arg(long, default_value_t = 36, value_parser = clap::value_parser!(i64).range(1..))]
    hours: i64,
    #[arg(long, default_value_t = 1)]
    max_rotated: usize,
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..))]
    resample_minutes: i64,
    /// Dotted rolling-mean overlay; 0 disables it
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(i64).range(0..))]
    rolling_hours: i64,
    /// Drop samples outside the [q, 1-q] quantile band before resampling
    #[arg(long, value_parser = parse_trim_quantile)]
    trim_quantile: Option<f64>,
    #[arg(long, value_delimiter = ',', default_value = "Temp,Feucht,Druck,IAQ")]
    channels: Vec<Channel>,
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,
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

    let history_plot = HistoryPlot {
        history: args.history,
        max_rotated: args.max_rotated,
        window: TimeDelta::hours(args.hours),
        resample: TimeDelta::minutes(args.resample_minutes),
        rolling: (args.rolling_hours > 0).then(|| TimeDelta::hours(args.rolling_hours)),
        trim_quantile: args.trim_quantile,
        channels: args.channels,
        ..HistoryPlot::default()
    };
    info!("Plotting {}", history_plot.history.display());
    plot(
        &history_plot,
        &args.out_file,
        args.mono_file.as_deref(),
        args.packed_file.as_deref(),
        args.threshold,
    )?;
    info!("Done");
    Ok(())
}
