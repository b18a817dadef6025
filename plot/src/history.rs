use crate::error::HistoryError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// One line of BSEC output, as appended by the logger.
///
/// The file has no header; columns are matched by position:
/// `DateTime, Acc, IAQ, IAQs, Temp, Feucht, Druck, Gas, BSECs, CO2e, bVOCe`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BsecRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub at: NaiveDateTime,
    pub accuracy: f64,
    pub iaq: f64,
    pub static_iaq: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub gas_resistance: f64,
    pub bsec_status: f64,
    pub co2_equivalent: f64,
    pub bvoc_equivalent: f64,
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(raw.trim())
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp {raw:?}")))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    Iaq,
    StaticIaq,
    GasResistance,
    Co2Equivalent,
    BvocEquivalent,
}

impl Channel {
    pub const DEFAULT: [Channel; 4] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Iaq,
    ];

    pub const ALL: [Channel; 8] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Iaq,
        Channel::StaticIaq,
        Channel::GasResistance,
        Channel::Co2Equivalent,
        Channel::BvocEquivalent,
    ];

    /// Column name in the history file, also used as the legend label.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Temperature => "Temp",
            Channel::Humidity => "Feucht",
            Channel::Pressure => "Druck",
            Channel::Iaq => "IAQ",
            Channel::StaticIaq => "IAQs",
            Channel::GasResistance => "Gas",
            Channel::Co2Equivalent => "CO2e",
            Channel::BvocEquivalent => "bVOCe",
        }
    }

    pub fn value(self, record: &BsecRecord) -> f64 {
        match self {
            Channel::Temperature => record.temperature,
            Channel::Humidity => record.humidity,
            Channel::Pressure => record.pressure,
            Channel::Iaq => record.iaq,
            Channel::StaticIaq => record.static_iaq,
            Channel::GasResistance => record.gas_resistance,
            Channel::Co2Equivalent => record.co2_equivalent,
            Channel::BvocEquivalent => record.bvoc_equivalent,
        }
    }

    /// Fragment of the "current values" header line.
    pub fn header_fragment(self, value: f64) -> String {
        match self {
            Channel::Temperature => format!("T={value:.1}'C"),
            Channel::Humidity => format!("H={value:.1}%"),
            Channel::Pressure => format!("P={value:.1}hPa"),
            Channel::Iaq => format!("IAQ={}", value.trunc() as i64),
            Channel::StaticIaq => format!("sIAQ={}", value.trunc() as i64),
            Channel::GasResistance => format!("G={}Ohm", value.trunc() as i64),
            Channel::Co2Equivalent => format!("CO2={}ppm", value.trunc() as i64),
            Channel::BvocEquivalent => format!("VOC={value:.2}ppm"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    /// Accepts the column label (`Temp`, `Feucht`, ...) or an English name, any case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        let by_name = match wanted.as_str() {
            "temperature" => Some(Channel::Temperature),
            "humidity" => Some(Channel::Humidity),
            "pressure" => Some(Channel::Pressure),
            "static-iaq" => Some(Channel::StaticIaq),
            "gas" => Some(Channel::GasResistance),
            "co2" => Some(Channel::Co2Equivalent),
            "voc" | "bvoc" => Some(Channel::BvocEquivalent),
            _ => None,
        };
        by_name
            .or_else(|| {
                Channel::ALL
                    .into_iter()
                    .find(|channel| channel.label().to_ascii_lowercase() == wanted)
            })
            .ok_or_else(|| format!("unknown channel {value:?}"))
    }
}

pub fn read_history_file(path: &Path) -> Result<Vec<BsecRecord>, HistoryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| HistoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<BsecRecord>() {
        match result {
            Ok(record) => records.push(record),
            Err(source) if source.is_io_error() => {
                return Err(HistoryError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(err) => {
                skipped += 1;
                debug!("Skipping row in {}: {}", path.display(), err);
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed rows in {}", skipped, path.display());
    }
    Ok(records)
}

/// Files produced by midnight rotation: `<base>.<suffix>`, oldest first.
pub fn rotated_files(base: &Path) -> Result<Vec<PathBuf>, HistoryError> {
    let Some(file_name) = base.file_name().and_then(|name| name.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{file_name}.");
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let entries = fs::read_dir(&dir).map_err(|source| HistoryError::List {
        path: base.to_path_buf(),
        source,
    })?;

    let mut rotated: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.len() > prefix.len() && name.starts_with(&prefix))
        })
        .map(|entry| entry.path())
        .collect();
    rotated.sort();
    Ok(rotated)
}

/// Reads the live history file plus the newest `max_rotated` rotated files.
/// Records come back oldest file first.
pub fn read_history(base: &Path, max_rotated: usize) -> Result<Vec<BsecRecord>, HistoryError> {
    let current = read_history_file(base)?;
    info!("Read {} samples from {}", current.len(), base.display());

    let mut rotated = rotated_files(base)?;
    let keep_from = rotated.len().saturating_sub(max_rotated);
    let rotated = rotated.split_off(keep_from);

    let mut combined = Vec::new();
    for path in rotated {
        match read_history_file(&path) {
            Ok(records) => {
                info!("Read {} samples from {}", records.len(), path.display());
                combined.extend(records);
            }
            Err(err) => warn!("Ignoring rotated history file: {}", err),
        }
    }
    combined.extend(current);
    Ok(combined)
}
