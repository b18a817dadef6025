use std::convert::Infallible;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("could not read history file {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("could not list rotated history files next to {path}: {source}")]
    List { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("image is {width}x{height}, panel is {panel_width}x{panel_height}")]
    Dimensions {
        width: u32,
        height: u32,
        panel_width: u32,
        panel_height: u32,
    },
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("no samples left to plot")]
    EmptyTable,
    #[error("overlay channels do not match the plotted channels")]
    ChannelMismatch,
}

impl From<Infallible> for PlotError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
