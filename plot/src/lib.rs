pub mod canvas;
pub mod chart;
pub mod color;
pub mod display_constants;
pub mod error;
pub mod history;
pub mod table;

use crate::chart::render_chart;
use crate::color::{gray_to_display_1bit, threshold};
use crate::display_constants::{PIXEL_HEIGHT, PIXEL_WIDTH};
use crate::history::read_history;
use chrono::TimeDelta;
use image::{GrayImage, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use crate::error::{HistoryError, PackError, PlotError};
pub use crate::history::Channel;
pub use crate::table::Table;

pub const DEFAULT_THRESHOLD: u8 = 200;

/// Accepts a trim quantile strictly between 0 and 0.5.
pub fn parse_trim_quantile(value: &str) -> Result<f64, String> {
    let q: f64 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number"))?;
    if q > 0.0 && q < 0.5 {
        Ok(q)
    } else {
        Err(format!("{q} is outside (0, 0.5)"))
    }
}

/// Which part of the sensor history to plot and how to condense it.
#[derive(Debug, Clone)]
pub struct HistoryPlot {
    pub history: PathBuf,
    pub max_rotated: usize,
    pub window: TimeDelta,
    pub resample: TimeDelta,
    pub rolling: Option<TimeDelta>,
    pub trim_quantile: Option<f64>,
    pub channels: Vec<Channel>,
    pub width: u32,
    pub height: u32,
}

impl Default for HistoryPlot {
    fn default() -> Self {
        HistoryPlot {
            history: PathBuf::from("bme680.csv"),
            max_rotated: 3,
            window: TimeDelta::hours(72),
            resample: TimeDelta::minutes(5),
            rolling: None,
            trim_quantile: None,
            channels: Channel::DEFAULT.to_vec(),
            width: PIXEL_WIDTH,
            height: PIXEL_HEIGHT,
        }
    }
}

/// Reads, windows, trims and resamples the history.
pub fn load_table(plot: &HistoryPlot) -> Result<Table, PlotError> {
    let records = read_history(&plot.history, plot.max_rotated)?;
    let table = Table::from_records(&records)
        .window(plot.window)
        .select(&plot.channels);
    info!("{} samples inside the {}h window", table.len(), plot.window.num_hours());

    let table = match plot.trim_quantile {
        Some(q) => {
            let trimmed = table.trim_outliers(q);
            info!("Trimmed {} outliers at q={}", table.len() - trimmed.len(), q);
            trimmed
        }
        None => table,
    };

    let table = table.resample(plot.resample);
    info!("Resampled to {} rows", table.len());
    if table.is_empty() {
        return Err(PlotError::EmptyTable);
    }
    Ok(table)
}

/// Full color chart of the history, sized for the panel.
pub fn render_history(plot: &HistoryPlot) -> Result<RgbImage, PlotError> {
    let table = load_table(plot)?;
    let overlay = plot.rolling.map(|span| table.rolling_mean(span));
    let canvas = render_chart(&table, overlay.as_ref(), plot.width, plot.height)?;
    info!("Chart rendered");
    Ok(canvas.into_image())
}

/// Two-level version of `chart`, plus the packed panel buffer.
pub fn quantize(chart: &RgbImage, level: u8) -> Result<(GrayImage, Vec<u8>), PlotError> {
    let mono = threshold(chart, level);
    info!("Thresholded at {}", level);
    let packed = gray_to_display_1bit(&mono, PIXEL_WIDTH, PIXEL_HEIGHT)?;
    info!("Image packed to 1bit format");
    Ok((mono, packed))
}

/// Renders the history and writes whichever outputs are requested.
pub fn plot(
    plot: &HistoryPlot,
    chart_file: &Path,
    mono_file: Option<&Path>,
    packed_file: Option<&Path>,
    level: u8,
) -> Result<Vec<u8>, PlotError> {
    let chart = render_history(plot)?;
    chart.save(chart_file)?;
    info!("Saved chart to {}", chart_file.display());

    let (mono, packed) = quantize(&chart, level)?;
    if let Some(mono_file) = mono_file {
        mono.save(mono_file)?;
        info!("Saved two-level chart to {}", mono_file.display());
    }
    if let Some(packed_file) = packed_file {
        fs::write(packed_file, &packed)?;
        info!("Packed buffer written to {}", packed_file.display());
    }
    Ok(packed)
}
