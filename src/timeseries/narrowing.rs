use super::{Timeseries, TimeseriesPoint};
use crate::metrics::MetricValue;
use crate::{Error, Result};

impl Timeseries<MetricValue> {
    /// Narrow to a numeric series.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnexpectedValueType`] on the first value that is not a finite number.
    pub fn assert_finite_numbers(&self) -> Result<Timeseries<f64>> {
        self.narrow("a finite number", MetricValue::as_finite_number)
    }

    /// Narrow to a boolean series.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnexpectedValueType`] on the first value that is not a boolean.
    pub fn assert_boolean(&self) -> Result<Timeseries<bool>> {
        self.narrow("a boolean", MetricValue::as_bool)
    }

    /// Narrow to a string series.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnexpectedValueType`] on the first value that is not a string.
    pub fn assert_strings(&self) -> Result<Timeseries<String>> {
        self.narrow("a string", |v| v.as_str().map(str::to_string))
    }

    fn narrow<U>(&self, expected: &'static str, convert: impl Fn(&MetricValue) -> Option<U>) -> Result<Timeseries<U>> {
        let points = self
            .points()
            .iter()
            .map(|p| {
                convert(&p.value)
                    .map(|value| TimeseriesPoint::new(p.date, value))
                    .ok_or_else(|| Error::UnexpectedValueType {
                        date: p.date.to_string(),
                        expected,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        // already sorted, `new` keeps the order
        Ok(Timeseries::new(points))
    }
}

impl From<&Timeseries<f64>> for Timeseries<MetricValue> {
    fn from(ts: &Timeseries<f64>) -> Self {
        ts.map_values(|v| MetricValue::Number(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
    }

    fn untyped(values: Vec<MetricValue>) -> Timeseries<MetricValue> {
        values
            .into_iter()
            .zip(1..)
            .map(|(v, day)| TimeseriesPoint::new(d(day), v))
            .collect()
    }

    #[test]
    fn test_assert_finite_numbers() {
        let ts = untyped(vec![1.0.into(), 2.5.into()]);
        let numbers = ts.assert_finite_numbers().unwrap();
        assert_eq!(numbers.values().copied().collect::<Vec<_>>(), vec![1.0, 2.5]);
    }

    #[test]
    fn test_assert_finite_numbers_rejects_non_finite() {
        let ts = untyped(vec![1.0.into(), f64::INFINITY.into()]);
        let err = ts.assert_finite_numbers().unwrap_err();
        assert!(matches!(err, Error::UnexpectedValueType { ref date, expected: "a finite number" } if date == "2022-01-02"));
    }

    #[test]
    fn test_assert_finite_numbers_rejects_text() {
        let ts = untyped(vec!["1".into()]);
        assert!(ts.assert_finite_numbers().is_err());
    }

    #[test]
    fn test_assert_boolean_and_strings() {
        assert!(untyped(vec![true.into(), false.into()]).assert_boolean().is_ok());
        assert!(untyped(vec![true.into(), 1.0.into()]).assert_boolean().is_err());

        let strings = untyped(vec!["a".into(), "b".into()]).assert_strings().unwrap();
        assert_eq!(strings.last_value().map(String::as_str), Some("b"));
        assert!(untyped(vec![false.into()]).assert_strings().is_err());
    }

    #[test]
    fn test_widen_numeric_series() {
        let numbers = Timeseries::new(vec![TimeseriesPoint::new(d(1), 4.0)]);
        let widened = Timeseries::<MetricValue>::from(&numbers);
        assert_eq!(widened.last_value(), Some(&MetricValue::Number(4.0)));
    }
}
