//! Multi-panel time-series chart, one stacked panel per channel.
//!
//! Drawn straight onto a [`Canvas`] the size of the panel so that nothing needs
//! rescaling before quantization. Layout fractions are relative to the figure:
//! the plot area spans `LEFT..RIGHT` horizontally and `BOTTOM..TOP` vertically
//! (measured from the bottom edge), panels are separated by `HSPACE` of a panel height.

use crate::canvas::Canvas;
use crate::error::PlotError;
use crate::table::Table;
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_8X13};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PointsIter, Polyline, PrimitiveStyle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

const TOP: f64 = 0.92;
const BOTTOM: f64 = 0.12;
const LEFT: f64 = 0.12;
const RIGHT: f64 = 0.97;
const HSPACE: f64 = 0.05;
const HEADER_X: f64 = 0.01;
const HEADER_Y: f64 = 0.94;

const Y_TICKS: usize = 3;
const X_TICKS: usize = 6;

const SERIES_COLORS: [Rgb888; 4] = [
    Rgb888::new(31, 119, 180),
    Rgb888::new(255, 127, 14),
    Rgb888::new(44, 160, 44),
    Rgb888::new(214, 39, 40),
];
const GRID_COLOR: Rgb888 = Rgb888::new(176, 176, 176);
const TEXT_COLOR: Rgb888 = Rgb888::BLACK;
const HEADER_COLOR: Rgb888 = Rgb888::RED;

/// Candidate x tick spacings, in minutes.
const TIME_STEPS: [i64; 13] = [5, 10, 15, 30, 60, 120, 180, 240, 360, 480, 720, 1440, 2880];

#[derive(Debug, Copy, Clone, PartialEq)]
struct Scale {
    min: f64,
    max: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn new(min: f64, max: f64, from: f64, to: f64) -> Self {
        let (min, max) = if max > min {
            (min, max)
        } else {
            let pad = (min.abs() * 0.01).max(0.1);
            (min - pad, max + pad)
        };
        Scale { min, max, from, to }
    }

    fn map(&self, value: f64) -> i32 {
        let ratio = (value - self.min) / (self.max - self.min);
        (self.from + ratio * (self.to - self.from)).round() as i32
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Copy, Clone)]
struct PanelArea {
    left: i32,
    right: i32,
    top: f64,
    bottom: f64,
}

fn panel_areas(width: u32, height: u32, panels: usize) -> Vec<PanelArea> {
    let (width, height) = (f64::from(width), f64::from(height));
    let top = (1.0 - TOP) * height;
    let bottom = (1.0 - BOTTOM) * height;
    let count = panels as f64;
    let panel_height = (bottom - top) / (count + (count - 1.0) * HSPACE);
    (0..panels)
        .map(|index| {
            let panel_top = top + index as f64 * panel_height * (1.0 + HSPACE);
            PanelArea {
                left: (LEFT * width).round() as i32,
                right: (RIGHT * width).round() as i32,
                top: panel_top,
                bottom: panel_top + panel_height,
            }
        })
        .collect()
}

/// "Nice" ticks (1, 2, 2.5, 5 times a power of ten) inside `[min, max]`, using the
/// smallest step that yields at most `max_ticks` of them.
pub fn value_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    if !(max > min) || max_ticks == 0 {
        return vec![min];
    }
    let first_index = |step: f64| (min / step).ceil();
    let count = |step: f64| ((max / step).floor() - first_index(step)) as i64 + 1;

    let base = 10f64.powf(((max - min) / max_ticks as f64).log10().floor() - 1.0);
    let Some(step) = (0..4)
        .flat_map(|exponent| [1.0, 2.0, 2.5, 5.0].map(|m| m * base * 10f64.powi(exponent)))
        .find(|step| count(*step) <= max_ticks as i64)
    else {
        return vec![min, max];
    };

    let first = first_index(step);
    (0..count(step).max(0))
        .map(|i| {
            let tick = (first + i as f64) * step;
            if tick.abs() < step * 1e-9 {
                0.0
            } else {
                tick
            }
        })
        .collect()
}

/// Clock-aligned ticks between `start` and `end` at the smallest spacing from
/// [`TIME_STEPS`] giving at most `max_ticks`.
pub fn time_ticks(start: NaiveDateTime, end: NaiveDateTime, max_ticks: usize) -> Vec<NaiveDateTime> {
    let span = (end - start).num_minutes();
    if span <= 0 || max_ticks == 0 {
        return vec![start];
    }
    let step = TIME_STEPS
        .iter()
        .copied()
        .find(|step| span / step < max_ticks as i64)
        .unwrap_or(TIME_STEPS[TIME_STEPS.len() - 1]);

    let midnight = start.date().and_time(NaiveTime::MIN);
    let offset = (start - midnight).num_seconds();
    let step_seconds = step * 60;
    let first = offset.div_euclid(step_seconds)
        + i64::from(offset.rem_euclid(step_seconds) != 0);

    let mut ticks = Vec::new();
    let mut tick = midnight + TimeDelta::seconds(first * step_seconds);
    while tick <= end {
        ticks.push(tick);
        tick += TimeDelta::seconds(step_seconds);
    }
    ticks
}

fn seconds_since(origin: NaiveDateTime, at: NaiveDateTime) -> f64 {
    (at - origin).num_milliseconds() as f64 / 1000.0
}

/// Every third pixel of the line.
fn draw_dotted(line: Line, color: Rgb888, canvas: &mut Canvas) -> Result<(), PlotError> {
    canvas.draw_iter(line.points().step_by(3).map(|point| Pixel(point, color)))?;
    Ok(())
}

fn series_points(table: &Table, column: usize, x: &Scale, y: &Scale, origin: NaiveDateTime) -> Vec<Point> {
    table
        .column(column)
        .filter(|(_, value)| !value.is_nan())
        .map(|(at, value)| Point::new(x.map(seconds_since(origin, at)), y.map(value)))
        .collect()
}

/// Header line built from the newest row, e.g. `T=21.4'C  H=45.1%  P=1013.2hPa  IAQ=57`.
pub fn header_text(table: &Table) -> Option<String> {
    let last = table.last()?;
    Some(
        table
            .channels()
            .iter()
            .zip(&last.values)
            .map(|(channel, value)| channel.header_fragment(*value))
            .collect::<Vec<_>>()
            .join("  "),
    )
}

/// Renders `table` with an optional dotted `overlay` (same channels, e.g. a rolling mean).
pub fn render_chart(
    table: &Table,
    overlay: Option<&Table>,
    width: u32,
    height: u32,
) -> Result<Canvas, PlotError> {
    let Some((start, end)) = table.time_range() else {
        return Err(PlotError::EmptyTable);
    };
    if table.channels().is_empty() {
        return Err(PlotError::EmptyTable);
    }
    if let Some(overlay) = overlay {
        if overlay.channels() != table.channels() {
            return Err(PlotError::ChannelMismatch);
        }
    }

    let mut canvas = Canvas::new(width, height);
    let areas = panel_areas(width, height, table.channels().len());
    let tick_style = MonoTextStyle::new(&FONT_6X10, TEXT_COLOR);
    let right_middle = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Middle)
        .build();
    let center_top = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Top)
        .build();

    let Some(first_area) = areas.first() else {
        return Err(PlotError::EmptyTable);
    };
    let x = Scale::new(
        0.0,
        seconds_since(start, end),
        f64::from(first_area.left),
        f64::from(first_area.right),
    );
    let x_ticks = time_ticks(start, end, X_TICKS);

    for (index, (channel, area)) in table.channels().iter().zip(&areas).enumerate() {
        let values = table
            .column(index)
            .chain(overlay.into_iter().flat_map(|o| o.column(index)))
            .map(|(_, value)| value)
            .filter(|value| !value.is_nan());
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !min.is_finite() || !max.is_finite() {
            continue;
        }
        let y = Scale::new(min, max, area.bottom, area.top);
        let (top, bottom) = (area.top.round() as i32, area.bottom.round() as i32);

        for tick in value_ticks(y.min, y.max, Y_TICKS) {
            if !y.contains(tick) {
                continue;
            }
            let row = y.map(tick);
            draw_dotted(
                Line::new(Point::new(area.left, row), Point::new(area.right, row)),
                GRID_COLOR,
                &mut canvas,
            )?;
            Text::with_text_style(
                &format!("{tick:.1}"),
                Point::new(area.left - 3, row),
                tick_style,
                right_middle,
            )
            .draw(&mut canvas)?;
        }
        for tick in &x_ticks {
            let column = x.map(seconds_since(start, *tick));
            draw_dotted(
                Line::new(Point::new(column, top), Point::new(column, bottom)),
                GRID_COLOR,
                &mut canvas,
            )?;
        }

        let color = SERIES_COLORS[index % SERIES_COLORS.len()];
        let points = series_points(table, index, &x, &y, start);
        Polyline::new(&points)
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut canvas)?;
        if let Some(overlay) = overlay {
            let points = series_points(overlay, index, &x, &y, start);
            for segment in points.windows(2) {
                draw_dotted(Line::new(segment[0], segment[1]), color, &mut canvas)?;
            }
        }

        // legend: short colored handle followed by the label, lower left
        let legend_row = bottom - 6;
        Line::new(Point::new(area.left + 3, legend_row), Point::new(area.left + 6, legend_row))
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut canvas)?;
        Text::with_baseline(
            channel.label(),
            Point::new(area.left + 9, legend_row),
            tick_style,
            Baseline::Middle,
        )
        .draw(&mut canvas)?;
    }

    if let Some(area) = areas.last() {
        let label_row = area.bottom.round() as i32 + 3;
        for tick in &x_ticks {
            Text::with_text_style(
                &tick.format("%H:%M").to_string(),
                Point::new(x.map(seconds_since(start, *tick)), label_row),
                tick_style,
                center_top,
            )
            .draw(&mut canvas)?;
        }
    }

    if let Some(header) = header_text(table) {
        let position = Point::new(
            (HEADER_X * f64::from(width)).round() as i32,
            ((1.0 - HEADER_Y) * f64::from(height)).round() as i32,
        );
        Text::with_baseline(
            &header,
            position,
            MonoTextStyle::new(&FONT_8X13, HEADER_COLOR),
            Baseline::Alphabetic,
        )
        .draw(&mut canvas)?;
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Channel;
    use crate::table::Row;
    use chrono::NaiveDate;
    use image::Rgb;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn sample_table() -> Table {
        let rows = (0..36)
            .map(|step| Row {
                at: at(8, 0) + TimeDelta::minutes(5 * step),
                values: vec![
                    20.0 + step as f64 * 0.1,
                    45.0,
                    1013.0 - step as f64 * 0.2,
                    50.0 + step as f64,
                ],
            })
            .collect();
        Table::new(Channel::DEFAULT.to_vec(), rows)
    }

    #[test]
    fn value_ticks_pick_round_steps() {
        assert_eq!(value_ticks(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);
        assert_eq!(value_ticks(20.3, 23.9, 3), vec![21.0, 22.0, 23.0]);
        assert_eq!(value_ticks(1006.0, 1013.0, 3), vec![1007.5, 1010.0, 1012.5]);
        assert_eq!(value_ticks(5.0, 5.0, 3), vec![5.0]);
    }

    #[test]
    fn time_ticks_align_to_the_clock() {
        let ticks = time_ticks(at(8, 7), at(11, 2), X_TICKS);
        assert_eq!(ticks, vec![at(8, 30), at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(11, 0)]);
        let wide = time_ticks(at(0, 0), at(0, 0) + TimeDelta::hours(72), X_TICKS);
        assert!(wide.len() <= X_TICKS);
        assert!(wide.len() >= 3);
    }

    #[test]
    fn panels_fill_the_plot_area() {
        let areas = panel_areas(400, 300, 4);
        assert_eq!(areas.len(), 4);
        assert_eq!(areas[0].left, 48);
        assert_eq!(areas[0].right, 388);
        assert!((areas[0].top - 24.0).abs() < 1e-9);
        assert!((areas[3].bottom - 264.0).abs() < 1e-9);
        assert!(areas[1].top > areas[0].bottom);
    }

    #[test]
    fn header_uses_latest_row() {
        let header = header_text(&sample_table()).unwrap();
        assert_eq!(header, "T=23.5'C  H=45.0%  P=1006.0hPa  IAQ=85");
    }

    #[test]
    fn renders_series_and_header() {
        let table = sample_table();
        let overlay = table.rolling_mean(TimeDelta::hours(1));
        let canvas = render_chart(&table, Some(&overlay), 400, 300).unwrap();
        let image = canvas.image();
        assert_eq!(image.dimensions(), (400, 300));
        let red = image.pixels().filter(|p| **p == Rgb([255, 0, 0])).count();
        assert!(red > 0, "header text missing");
        let blue = image.pixels().filter(|p| **p == Rgb([31, 119, 180])).count();
        assert!(blue > 0, "first series missing");
    }

    #[test]
    fn rejects_empty_and_mismatched_tables() {
        let empty = Table::new(Channel::DEFAULT.to_vec(), Vec::new());
        assert!(matches!(render_chart(&empty, None, 400, 300), Err(PlotError::EmptyTable)));
        let table = sample_table();
        let other = table.select(&[Channel::Temperature]);
        assert!(matches!(
            render_chart(&table, Some(&other), 400, 300),
            Err(PlotError::ChannelMismatch)
        ));
    }
}
