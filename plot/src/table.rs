use crate::history::{BsecRecord, Channel};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub at: NaiveDateTime,
    pub values: Vec<f64>,
}

/// Time-indexed samples, one column per channel. Rows are kept in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    channels: Vec<Channel>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(channels: Vec<Channel>, mut rows: Vec<Row>) -> Self {
        rows.sort_by_key(|row| row.at);
        Table { channels, rows }
    }

    /// All channels of every record.
    pub fn from_records(records: &[BsecRecord]) -> Self {
        let rows = records
            .iter()
            .map(|record| Row {
                at: record.at,
                values: Channel::ALL.iter().map(|c| c.value(record)).collect(),
            })
            .collect();
        Table::new(Channel::ALL.to_vec(), rows)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.rows.first()?.at, self.rows.last()?.at))
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.rows.iter().map(move |row| (row.at, row.values[index]))
    }

    /// Keeps the requested channels, in the requested order. Unknown channels are ignored.
    pub fn select(&self, channels: &[Channel]) -> Table {
        let indices: Vec<(Channel, usize)> = channels
            .iter()
            .filter_map(|wanted| {
                self.channels
                    .iter()
                    .position(|c| c == wanted)
                    .map(|index| (*wanted, index))
            })
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                at: row.at,
                values: indices.iter().map(|(_, index)| row.values[*index]).collect(),
            })
            .collect();
        Table {
            channels: indices.into_iter().map(|(channel, _)| channel).collect(),
            rows,
        }
    }

    /// Rows within `span` of the newest row, both ends inclusive.
    pub fn window(&self, span: TimeDelta) -> Table {
        let Some(last) = self.last().map(|row| row.at) else {
            return self.clone();
        };
        let first = last - span;
        Table {
            channels: self.channels.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.at >= first && row.at <= last)
                .cloned()
                .collect(),
        }
    }

    /// Drops rows holding a value outside the `[q, 1 - q]` quantile band of its channel.
    /// NaN values never cause a drop.
    pub fn trim_outliers(&self, q: f64) -> Table {
        if !(q > 0.0 && q < 0.5) {
            return self.clone();
        }
        let bands: Vec<Option<(f64, f64)>> = (0..self.channels.len())
            .map(|index| {
                let mut values: Vec<f64> = self
                    .column(index)
                    .map(|(_, value)| value)
                    .filter(|value| !value.is_nan())
                    .collect();
                values.sort_by(f64::total_cmp);
                Some((quantile(&values, q)?, quantile(&values, 1.0 - q)?))
            })
            .collect();

        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row.values.iter().zip(&bands).all(|(value, band)| match band {
                    Some((low, high)) => value.is_nan() || (*value >= *low && *value <= *high),
                    None => true,
                })
            })
            .cloned()
            .collect();
        Table {
            channels: self.channels.clone(),
            rows,
        }
    }

    /// Averages rows into fixed buckets aligned to midnight of the first day.
    ///
    /// Buckets are closed on the left and labelled with their right edge. A bucket is
    /// dropped when any channel has no non-NaN sample in it.
    pub fn resample(&self, period: TimeDelta) -> Table {
        let period_ms = period.num_milliseconds();
        let Some(first) = self.rows.first() else {
            return self.clone();
        };
        if period_ms <= 0 {
            return self.clone();
        }
        let origin = first.at.date().and_time(NaiveTime::MIN);
        let width = self.channels.len();

        let mut buckets: BTreeMap<i64, (Vec<f64>, Vec<usize>)> = BTreeMap::new();
        for row in &self.rows {
            let offset = (row.at - origin).num_milliseconds();
            let bucket = offset.div_euclid(period_ms);
            let (sums, counts) = buckets
                .entry(bucket)
                .or_insert_with(|| (vec![0.0; width], vec![0; width]));
            for (index, value) in row.values.iter().enumerate() {
                if !value.is_nan() {
                    sums[index] += value;
                    counts[index] += 1;
                }
            }
        }

        let rows = buckets
            .into_iter()
            .filter(|(_, (_, counts))| counts.iter().all(|count| *count > 0))
            .map(|(bucket, (sums, counts))| Row {
                at: origin + TimeDelta::milliseconds((bucket + 1) * period_ms),
                values: sums
                    .iter()
                    .zip(&counts)
                    .map(|(sum, count)| sum / *count as f64)
                    .collect(),
            })
            .collect();
        Table {
            channels: self.channels.clone(),
            rows,
        }
    }

    /// Trailing mean over `(t - span, t]` for every row.
    pub fn rolling_mean(&self, span: TimeDelta) -> Table {
        let width = self.channels.len();
        let mut start = 0;
        let mut rows = Vec::with_capacity(self.rows.len());
        for (end, row) in self.rows.iter().enumerate() {
            while self.rows[start].at <= row.at - span && start < end {
                start += 1;
            }
            let mut sums = vec![0.0; width];
            let mut counts = vec![0usize; width];
            for window_row in &self.rows[start..=end] {
                for (index, value) in window_row.values.iter().enumerate() {
                    if !value.is_nan() {
                        sums[index] += value;
                        counts[index] += 1;
                    }
                }
            }
            rows.push(Row {
                at: row.at,
                values: sums
                    .iter()
                    .zip(&counts)
                    .map(|(sum, count)| {
                        if *count == 0 {
                            f64::NAN
                        } else {
                            sum / *count as f64
                        }
                    })
                    .collect(),
            });
        }
        Table {
            channels: self.channels.clone(),
            rows,
        }
    }
}

/// Linear interpolation between the order statistics of `sorted`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    let fraction = position - low as f64;
    Some(sorted[low] + (sorted[high] - sorted[low]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .unwrap()
    }

    fn table(rows: &[(NaiveDateTime, f64, f64)]) -> Table {
        Table::new(
            vec![Channel::Temperature, Channel::Humidity],
            rows.iter()
                .map(|(at, t, h)| Row {
                    at: *at,
                    values: vec![*t, *h],
                })
                .collect(),
        )
    }

    #[test]
    fn resample_labels_buckets_with_right_edge() {
        let t = table(&[
            (at(10, 0, 0), 20.0, 40.0),
            (at(10, 2, 30), 22.0, 42.0),
            (at(10, 5, 0), 30.0, 50.0),
            (at(10, 21, 0), 10.0, 60.0),
        ]);
        let resampled = t.resample(TimeDelta::minutes(5));
        let rows = resampled.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].at, at(10, 5, 0));
        assert_eq!(rows[0].values, vec![21.0, 41.0]);
        assert_eq!(rows[1].at, at(10, 10, 0));
        assert_eq!(rows[1].values, vec![30.0, 50.0]);
        assert_eq!(rows[2].at, at(10, 25, 0));
    }

    #[test]
    fn resample_drops_buckets_with_a_missing_channel() {
        let t = table(&[
            (at(10, 1, 0), 20.0, f64::NAN),
            (at(10, 6, 0), 21.0, f64::NAN),
            (at(10, 7, 0), 23.0, 44.0),
        ]);
        let resampled = t.resample(TimeDelta::minutes(5));
        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled.rows()[0].values, vec![22.0, 44.0]);
    }

    #[test]
    fn window_is_inclusive_and_sorted() {
        let t = table(&[
            (at(12, 0, 0), 3.0, 0.0),
            (at(9, 0, 0), 1.0, 0.0),
            (at(10, 0, 0), 2.0, 0.0),
        ]);
        let windowed = t.window(TimeDelta::hours(2));
        let times: Vec<_> = windowed.rows().iter().map(|r| r.at).collect();
        assert_eq!(times, vec![at(10, 0, 0), at(12, 0, 0)]);
    }

    #[test]
    fn rolling_mean_uses_half_open_trailing_window() {
        let t = table(&[
            (at(0, 0, 0), 0.0, 0.0),
            (at(3, 0, 0), 3.0, 3.0),
            (at(6, 0, 0), 6.0, 6.0),
            (at(7, 0, 0), 9.0, 9.0),
        ]);
        let rolled = t.rolling_mean(TimeDelta::hours(6));
        let temps: Vec<f64> = rolled.column(0).map(|(_, v)| v).collect();
        // at 06:00 the 00:00 sample falls out of (00:00, 06:00]
        assert_eq!(temps, vec![0.0, 1.5, 4.5, 6.0]);
    }

    #[test]
    fn select_reorders_and_ignores_unknown_channels() {
        let t = table(&[(at(10, 0, 0), 20.0, 40.0)]);
        let selected = t.select(&[Channel::Humidity, Channel::Iaq, Channel::Temperature]);
        assert_eq!(
            selected.channels(),
            &[Channel::Humidity, Channel::Temperature]
        );
        assert_eq!(selected.rows()[0].values, vec![40.0, 20.0]);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.5), Some(3.0));
        let tenth = quantile(&sorted, 0.1).unwrap();
        assert!((tenth - 1.4).abs() < 1e-12);
        assert_eq!(quantile(&[], 0.1), None);
    }

    #[test]
    fn trim_outliers_ignores_nan() {
        let mut rows: Vec<(NaiveDateTime, f64, f64)> = (0..20)
            .map(|minute| (at(10, minute, 0), 20.0 + minute as f64 * 0.01, 40.0))
            .collect();
        rows[5].1 = f64::NAN;
        rows.push((at(10, 30, 0), 85.0, 40.0));
        let trimmed = table(&rows).trim_outliers(0.04);
        assert!(trimmed.rows().iter().any(|row| row.values[0].is_nan()));
        assert!(trimmed
            .rows()
            .iter()
            .all(|row| row.values[0].is_nan() || row.values[0] < 80.0));
    }

    #[test]
    fn trim_outliers_outside_band_is_a_no_op() {
        let t = table(&[
            (at(10, 0, 0), 20.0, 40.0),
            (at(10, 1, 0), 90.0, 40.0),
            (at(10, 2, 0), 21.0, 40.0),
        ]);
        for q in [0.0, 0.5, 0.7, -0.1] {
            assert_eq!(t.trim_outliers(q), t);
        }
    }

    #[test]
    fn trim_outliers_drops_spikes() {
        let mut rows: Vec<(NaiveDateTime, f64, f64)> = (0..20)
            .map(|minute| (at(10, minute, 0), 20.0 + minute as f64 * 0.01, 40.0))
            .collect();
        rows.push((at(10, 30, 0), 85.0, 40.0));
        let trimmed = table(&rows).trim_outliers(0.04);
        assert!(trimmed.rows().iter().all(|row| row.values[0] < 80.0));
        assert!(trimmed.len() >= 18);
    }
}
