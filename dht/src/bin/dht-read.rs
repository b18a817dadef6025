use clap::Parser;
use envmon_dht::{
    read_retry, Dht22, DhtError, Reading, DEFAULT_PIN, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing::level_filters::LevelFilter;

/// Prints a single DHT22 reading.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "DHT_PIN", default_value_t = DEFAULT_PIN)]
    pin: u8,
    #[arg(short, long)]
    verbose: bool,
}

fn read(pin: u8) -> Result<Reading, DhtError> {
    let mut sensor = Dht22::new(pin)?;
    read_retry(
        &mut sensor,
        DEFAULT_RETRIES,
        Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
    )
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        })
        .init();

    match read(args.pin) {
        Ok(reading) => {
            println!(
                "Temp={:.1}*  Humidity={:.1}%",
                reading.temperature, reading.humidity
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            debug!("{}", err);
            println!("Failed to get reading. Try again!");
            ExitCode::from(1)
        }
    }
}
