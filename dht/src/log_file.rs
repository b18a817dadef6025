use crate::dht22::Reading;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_LOG_FILE: &str = "data/dht22_log.csv";

#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct LogRow {
    #[serde(rename = "Datetime", serialize_with = "timestamp")]
    at: NaiveDateTime,
    #[serde(rename = "Temperatur/°C", serialize_with = "one_decimal")]
    temperature: f64,
    #[serde(rename = "Luftfeuchte/%", serialize_with = "one_decimal")]
    humidity: f64,
}

fn timestamp<S: Serializer>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&at.format("%Y-%m-%d %H:%M:%S%.6f"))
}

fn one_decimal<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:.1}"))
}

/// Appends one row, writing the header first when the file is new.
pub fn append_reading(path: &Path, at: NaiveDateTime, reading: Reading) -> Result<(), LogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let new_file = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(new_file)
        .from_writer(file);
    writer.serialize(LogRow {
        at,
        temperature: reading.temperature,
        humidity: reading.humidity,
    })?;
    writer.flush()?;
    info!(
        "Logged {:.1} C, {:.1} % to {}",
        reading.temperature,
        reading.humidity,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_micro_opt(7, 30, second, 250))
            .unwrap()
    }

    #[test]
    fn creates_directory_and_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("dht22_log.csv");
        let reading = Reading {
            temperature: 21.46,
            humidity: 48.04,
        };
        append_reading(&path, at(0), reading).unwrap();
        append_reading(
            &path,
            at(5),
            Reading {
                temperature: -3.0,
                humidity: 99.95,
            },
        )
        .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Datetime,Temperatur/°C,Luftfeuchte/%\n\
             2024-03-01 07:30:00.000250,21.5,48.0\n\
             2024-03-01 07:30:05.000250,-3.0,100.0\n"
        );
    }

    #[test]
    fn existing_file_gets_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "Datetime,Temperatur/°C,Luftfeuchte/%\n").unwrap();
        append_reading(
            &path,
            at(1),
            Reading {
                temperature: 20.0,
                humidity: 50.0,
            },
        )
        .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("07:30:01.000250,20.0,50.0\n"));
    }
}
