use super::DateRange;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A single dated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint<T> {
    pub date: NaiveDate,
    pub value: T,
}

impl<T> TimeseriesPoint<T> {
    #[must_use]
    pub const fn new(date: NaiveDate, value: T) -> Self {
        Self { date, value }
    }

    /// Midnight UTC at the start of this point's date.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Options for [`Timeseries::compute_deltas`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeltaOptions {
    /// Keep the first point unmodified instead of dropping it.
    pub keep_initial_value: bool,

    /// Drop computed deltas strictly below this value.
    pub min_delta_to_keep: Option<f64>,
}

/// An immutable series of values sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawTimeseries<T>",
    bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>")
)]
pub struct Timeseries<T> {
    points: Vec<TimeseriesPoint<T>>,
}

/// Wire shape accepted on deserialization; values may be `null` and are rejected in [`TryFrom`].
#[derive(Deserialize)]
pub struct RawTimeseries<T> {
    points: Vec<RawPoint<T>>,
}

#[derive(Deserialize)]
pub struct RawPoint<T> {
    date: NaiveDate,
    value: Option<T>,
}

impl<T> TryFrom<RawTimeseries<T>> for Timeseries<T> {
    type Error = Error;

    fn try_from(raw: RawTimeseries<T>) -> Result<Self> {
        let points = raw
            .points
            .into_iter()
            .map(|p| match p.value {
                Some(value) => Ok(TimeseriesPoint::new(p.date, value)),
                None => Err(Error::NullValue(p.date.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(points))
    }
}

impl<T> Default for Timeseries<T> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<T> FromIterator<TimeseriesPoint<T>> for Timeseries<T> {
    fn from_iter<I: IntoIterator<Item = TimeseriesPoint<T>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<T> Timeseries<T> {
    /// Build a series, sorting the points by date.
    ///
    /// The sort is stable: points sharing a date keep their relative input order.
    pub fn new(points: impl IntoIterator<Item = TimeseriesPoint<T>>) -> Self {
        let mut points: Vec<_> = points.into_iter().collect();
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from timestamped, possibly missing values.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDate`] if a timestamp is not exactly midnight UTC and with
    /// [`Error::NullValue`] if a value is missing.
    pub fn from_timestamps(points: impl IntoIterator<Item = (DateTime<Utc>, Option<T>)>) -> Result<Self> {
        let points = points
            .into_iter()
            .map(|(timestamp, value)| {
                if timestamp.time() != NaiveTime::MIN {
                    return Err(Error::InvalidDate(timestamp));
                }

                let date = timestamp.date_naive();
                value
                    .map(|value| TimeseriesPoint::new(date, value))
                    .ok_or_else(|| Error::NullValue(date.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(points))
    }

    #[must_use]
    pub fn points(&self) -> &[TimeseriesPoint<T>] {
        &self.points
    }

    #[must_use]
    pub fn into_points(self) -> Vec<TimeseriesPoint<T>> {
        self.points
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns `true` if the series has at least one point.
    ///
    /// Use [`Self::as_non_empty`] to obtain a view where `last` and friends cannot fail.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        !self.points.is_empty()
    }

    #[must_use]
    pub const fn as_non_empty(&self) -> Option<NonEmptyTimeseries<'_, T>> {
        if self.points.is_empty() {
            None
        } else {
            Some(NonEmptyTimeseries { inner: self })
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.points.iter().map(|p| &p.value)
    }

    #[must_use]
    pub fn first(&self) -> Option<&TimeseriesPoint<T>> {
        self.points.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TimeseriesPoint<T>> {
        self.points.last()
    }

    #[must_use]
    pub fn min_date(&self) -> Option<NaiveDate> {
        self.first().map(|p| p.date)
    }

    #[must_use]
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.last().map(|p| p.date)
    }

    #[must_use]
    pub fn last_value(&self) -> Option<&T> {
        self.last().map(|p| &p.value)
    }

    /// Returns the point closest to `target`.
    ///
    /// When `target` falls exactly halfway between two adjacent dates, the earlier point wins.
    #[must_use]
    pub fn find_nearest_date(&self, target: DateTime<Utc>) -> Option<&TimeseriesPoint<T>> {
        self.nearest_index(target).and_then(|index| self.points.get(index))
    }

    fn nearest_index(&self, target: DateTime<Utc>) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }

        let after = self.points.partition_point(|p| p.timestamp() < target);
        if after == 0 {
            return Some(0);
        }

        let before = after - 1;
        let Some(next) = self.points.get(after) else {
            return Some(before);
        };

        let distance_before = target - self.points[before].timestamp();
        let distance_after = next.timestamp() - target;
        if distance_before <= distance_after {
            Some(before)
        } else {
            Some(after)
        }
    }

    /// Returns the points whose dates satisfy every bound of `range`.
    #[must_use]
    pub fn filter_to_date_range(&self, range: &DateRange) -> Self
    where
        T: Clone,
    {
        self.filter(|p| range.contains(p.date))
    }

    /// Returns the points at indices `start..end`, clamped to the series length.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Self
    where
        T: Clone,
    {
        let end = end.min(self.points.len());
        let start = start.min(end);
        Self {
            points: self.points[start..end].to_vec(),
        }
    }

    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&TimeseriesPoint<T>) -> bool) -> Self
    where
        T: Clone,
    {
        Self {
            points: self.points.iter().filter(|p| predicate(p)).cloned().collect(),
        }
    }

    /// Transform every value, keeping dates and order.
    #[must_use]
    pub fn map_values<U>(&self, mut f: impl FnMut(&T) -> U) -> Timeseries<U> {
        Timeseries {
            points: self.points.iter().map(|p| TimeseriesPoint::new(p.date, f(&p.value))).collect(),
        }
    }

    /// Serialize as `{"points":[{"date":"YYYY-MM-DD","value":...}]}`.
    ///
    /// # Errors
    ///
    /// Fails if a value cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String>
    where
        T: Serialize,
    {
        serde_json::to_string(self).map_err(|e| Error::Serialize {
            what: "timeseries".to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse the representation produced by [`Self::to_json`].
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, on dates that are not calendar dates, and on `null` values.
    pub fn from_json(json: &str) -> Result<Self>
    where
        T: for<'de> Deserialize<'de>,
    {
        let raw: RawTimeseries<T> = serde_json::from_str(json).map_err(|e| Error::parse("timeseries JSON", e))?;
        Self::try_from(raw)
    }
}

impl Timeseries<f64> {
    /// Differences between consecutive values, dated at the later point.
    #[must_use]
    pub fn compute_deltas(&self, options: DeltaOptions) -> Self {
        let initial = self
            .points
            .first()
            .filter(|_| options.keep_initial_value)
            .cloned();

        let deltas = self
            .points
            .windows(2)
            .map(|pair| TimeseriesPoint::new(pair[1].date, pair[1].value - pair[0].value))
            .filter(|p| options.min_delta_to_keep.is_none_or(|min| p.value >= min));

        Self {
            points: initial.into_iter().chain(deltas).collect(),
        }
    }

    #[must_use]
    pub fn min_value(&self) -> Option<f64> {
        self.values().copied().reduce(f64::min)
    }

    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.values().copied().reduce(f64::max)
    }
}

/// A borrowed view of a series known to hold at least one point.
#[derive(Debug, Clone, Copy)]
pub struct NonEmptyTimeseries<'a, T> {
    inner: &'a Timeseries<T>,
}

impl<'a, T> NonEmptyTimeseries<'a, T> {
    #[must_use]
    pub const fn timeseries(&self) -> &'a Timeseries<T> {
        self.inner
    }

    #[must_use]
    pub fn first(&self) -> &'a TimeseriesPoint<T> {
        &self.inner.points[0]
    }

    #[must_use]
    pub fn last(&self) -> &'a TimeseriesPoint<T> {
        &self.inner.points[self.inner.points.len() - 1]
    }

    #[must_use]
    pub fn min_date(&self) -> NaiveDate {
        self.first().date
    }

    #[must_use]
    pub fn max_date(&self) -> NaiveDate {
        self.last().date
    }

    #[must_use]
    pub fn last_value(&self) -> &'a T {
        &self.last().value
    }

    #[must_use]
    pub fn find_nearest_date(&self, target: DateTime<Utc>) -> &'a TimeseriesPoint<T> {
        &self.inner.points[self.inner.nearest_index(target).unwrap_or(0)]
    }
}
