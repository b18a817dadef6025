use chrono::Local;
use clap::Parser;
use envmon_dht::log_file::DEFAULT_LOG_FILE;
use envmon_dht::{
    append_reading, read_retry, Dht22, DEFAULT_PIN, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing::level_filters::LevelFilter;

/// Takes one DHT22 reading and appends it to the CSV log.
#[derive(Debug, Parser)]
struct Args {
    /// BCM pin of the sensor data line
    #[arg(long, env = "DHT_PIN", default_value_t = DEFAULT_PIN)]
    pin: u8,
    #[arg(long, env = "DHT_LOG", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    retry_delay_secs: u64,
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

    let mut sensor = Dht22::new(args.pin)?;
    let reading = read_retry(
        &mut sensor,
        args.retries,
        Duration::from_secs(args.retry_delay_secs),
    )?;
    info!("Read {:?}", reading);
    append_reading(&args.log_file, Local::now().naive_local(), reading)?;
    Ok(())
}
