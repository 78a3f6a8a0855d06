use super::{Timeseries, TimeseriesPoint};
use crate::{Error, Result};
use chrono::{Days, NaiveDate};

/// The trailing window ending at one point of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<T> {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Calendar days actually covered, `end_date - start_date + 1`.
    ///
    /// Can be smaller than the requested window size when earlier dates are missing.
    pub days: u32,

    pub timeseries: Timeseries<T>,
}

/// Options for [`Timeseries::rolling_average`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingAverageOptions {
    pub days: u32,

    /// Divide by `days` rather than by the number of points present, so gaps count as zeros.
    pub treat_missing_dates_as_zero: bool,
}

impl RollingAverageOptions {
    #[must_use]
    pub const fn new(days: u32) -> Self {
        Self {
            days,
            treat_missing_dates_as_zero: false,
        }
    }

    #[must_use]
    pub const fn treat_missing_dates_as_zero(mut self, value: bool) -> Self {
        self.treat_missing_dates_as_zero = value;
        self
    }
}

impl<T: Clone> Timeseries<T> {
    /// For every point, the window of points dated within the `days - 1` preceding calendar days.
    ///
    /// Windows never look forward: a window ends at its own point, even when later points share
    /// the same date.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidWindow`] if `days` is zero.
    pub fn windowed(&self, days: u32) -> Result<Timeseries<Window<T>>> {
        if days == 0 {
            return Err(Error::InvalidWindow(days));
        }

        let points = self.points();
        let mut start = 0;
        let mut windows = Vec::with_capacity(points.len());

        for (end, point) in points.iter().enumerate() {
            let earliest = point
                .date
                .checked_sub_days(Days::new(u64::from(days - 1)))
                .unwrap_or(NaiveDate::MIN);

            while points[start].date < earliest {
                start += 1;
            }

            let start_date = points[start].date;
            let covered = (point.date - start_date).num_days() + 1;

            windows.push(TimeseriesPoint::new(
                point.date,
                Window {
                    start_date,
                    end_date: point.date,
                    days: u32::try_from(covered).unwrap_or(days),
                    timeseries: Timeseries::new(points[start..=end].iter().cloned()),
                },
            ));
        }

        Ok(Timeseries::new(windows))
    }
}

impl Timeseries<f64> {
    /// The mean of each trailing window, dated at the window's last point.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidWindow`] if `options.days` is zero.
    pub fn rolling_average(&self, options: RollingAverageOptions) -> Result<Self> {
        let windows = self.windowed(options.days)?;

        Ok(windows.map_values(|window| {
            let sum: f64 = window.timeseries.values().sum();

            #[expect(clippy::cast_precision_loss, reason = "window sizes are far below 2^52")]
            let count = if options.treat_missing_dates_as_zero {
                f64::from(options.days)
            } else {
                window.timeseries.len() as f64
            };

            sum / count
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
    }

    fn series(values: &[(u32, f64)]) -> Timeseries<f64> {
        Timeseries::new(values.iter().map(|&(day, v)| TimeseriesPoint::new(d(day), v)))
    }

    #[test]
    fn test_windowed_contiguous() {
        let ts = series(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let windows = ts.windowed(3).unwrap();
        assert_eq!(windows.len(), 4);

        let first = &windows.points()[0].value;
        assert_eq!(first.start_date, d(1));
        assert_eq!(first.end_date, d(1));
        assert_eq!(first.days, 1);
        assert_eq!(first.timeseries.len(), 1);

        let last = &windows.points()[3].value;
        assert_eq!(last.start_date, d(2));
        assert_eq!(last.end_date, d(4));
        assert_eq!(last.days, 3);
        assert_eq!(last.timeseries.values().copied().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_windowed_with_gap_covers_fewer_days() {
        let ts = series(&[(1, 1.0), (4, 4.0), (5, 5.0)]);
        let windows = ts.windowed(3).unwrap();

        let at_4 = &windows.points()[1].value;
        assert_eq!(at_4.start_date, d(4));
        assert_eq!(at_4.days, 1);

        let at_5 = &windows.points()[2].value;
        assert_eq!(at_5.start_date, d(4));
        assert_eq!(at_5.days, 2);
        assert_eq!(at_5.timeseries.len(), 2);
    }

    #[test]
    fn test_windowed_never_looks_forward() {
        let ts = series(&[(1, 1.0), (1, 10.0)]);
        let windows = ts.windowed(1).unwrap();
        assert_eq!(windows.points()[0].value.timeseries.len(), 1);
        assert_eq!(windows.points()[1].value.timeseries.len(), 2);
    }

    #[test]
    fn test_windowed_rejects_zero_days() {
        let ts = series(&[(1, 1.0)]);
        assert!(matches!(ts.windowed(0), Err(Error::InvalidWindow(0))));
    }

    #[test]
    fn test_rolling_average() {
        let ts = series(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
        let avg = ts.rolling_average(RollingAverageOptions::new(2)).unwrap();
        assert_eq!(avg.values().copied().collect::<Vec<_>>(), vec![1.0, 1.5, 2.5, 3.5]);
        assert_eq!(avg.dates().collect::<Vec<_>>(), ts.dates().collect::<Vec<_>>());
    }

    #[test]
    fn test_rolling_average_treats_missing_dates_as_zero() {
        // January 3rd is missing.
        let ts = series(&[(1, 1.0), (2, 2.0), (4, 3.0), (5, 4.0), (6, 5.0)]);

        let plain = ts.rolling_average(RollingAverageOptions::new(3)).unwrap();
        let zero_filled = ts
            .rolling_average(RollingAverageOptions::new(3).treat_missing_dates_as_zero(true))
            .unwrap();

        let plain_third = plain.points()[2].value;
        let zero_third = zero_filled.points()[2].value;
        assert!((plain_third - 2.5).abs() < 1e-9);
        assert!((zero_third - 5.0 / 3.0).abs() < 1e-9);
        assert!(zero_third < plain_third);

        // Once the window is full both variants agree.
        assert!((plain.points()[4].value - 4.0).abs() < 1e-9);
        assert!((zero_filled.points()[4].value - 4.0).abs() < 1e-9);
    }
}
