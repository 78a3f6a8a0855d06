//! Immutable, date-indexed series and the transformations defined over them
//!
//! A [`Timeseries`] is an ordered list of [`TimeseriesPoint`]s keyed by calendar date. Points
//! are always stored in ascending date order and every transformation returns a brand new
//! series, so a series handed out by a provider can be shared freely between consumers.
//!
//! # Implementation Model
//!
//! Dates are [`chrono::NaiveDate`] values interpreted as UTC calendar days. Series built from
//! timestamps or from JSON are validated on the way in: a timestamp with a time-of-day component
//! or a missing value is rejected at construction, never at use.
//!
//! Gaps between dates are legal. The windowing operations ([`Timeseries::windowed`] and
//! [`Timeseries::rolling_average`]) look backward a fixed number of *calendar* days, so a window
//! over sparse data may cover fewer points (and fewer days) than requested.
//!
//! Series of untyped [`MetricValue`](crate::metrics::MetricValue)s are narrowed into strongly
//! typed series with [`Timeseries::assert_finite_numbers`] and friends before numeric algorithms
//! run over them.

mod date_range;
mod narrowing;
mod series;
mod window;

pub use date_range::DateRange;
pub use series::{DeltaOptions, NonEmptyTimeseries, Timeseries, TimeseriesPoint};
pub use window::{RollingAverageOptions, Window};
