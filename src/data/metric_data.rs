use crate::metrics::{Category, Metric, MetricValue};
use crate::regions::Region;
use crate::timeseries::Timeseries;
use crate::{Error, Result};
use std::sync::Arc;

/// The value of one metric in one region, optionally with its history.
///
/// Cloning is cheap: the metric, region, and timeseries are shared.
#[derive(Debug, Clone)]
pub struct MetricData {
    metric: Arc<Metric>,
    region: Arc<Region>,
    current_value: Option<MetricValue>,
    timeseries: Option<Arc<Timeseries<MetricValue>>>,
}

impl MetricData {
    #[must_use]
    pub fn new(
        metric: Arc<Metric>,
        region: Arc<Region>,
        current_value: Option<MetricValue>,
        timeseries: Option<Timeseries<MetricValue>>,
    ) -> Self {
        Self {
            metric,
            region,
            current_value,
            timeseries: timeseries.map(Arc::new),
        }
    }

    /// Like [`Self::new`], taking an already shared timeseries.
    #[must_use]
    pub const fn with_shared_timeseries(
        metric: Arc<Metric>,
        region: Arc<Region>,
        current_value: Option<MetricValue>,
        timeseries: Option<Arc<Timeseries<MetricValue>>>,
    ) -> Self {
        Self {
            metric,
            region,
            current_value,
            timeseries,
        }
    }

    #[must_use]
    pub const fn metric(&self) -> &Arc<Metric> {
        &self.metric
    }

    #[must_use]
    pub const fn region(&self) -> &Arc<Region> {
        &self.region
    }

    #[must_use]
    pub const fn current_value(&self) -> Option<&MetricValue> {
        self.current_value.as_ref()
    }

    /// The current value if it is a finite number.
    #[must_use]
    pub fn current_number(&self) -> Option<f64> {
        self.current_value.as_ref().and_then(MetricValue::as_finite_number)
    }

    #[must_use]
    pub const fn has_timeseries(&self) -> bool {
        self.timeseries.is_some()
    }

    /// # Errors
    ///
    /// Fails with [`Error::MissingTimeseries`] if this data was fetched without its history.
    pub fn timeseries(&self) -> Result<&Timeseries<MetricValue>> {
        self.timeseries.as_deref().ok_or_else(|| Error::MissingTimeseries {
            region: self.region.region_id.clone(),
            metric: self.metric.id().to_string(),
        })
    }

    #[must_use]
    pub const fn shared_timeseries(&self) -> Option<&Arc<Timeseries<MetricValue>>> {
        self.timeseries.as_ref()
    }

    #[must_use]
    pub fn without_timeseries(&self) -> Self {
        Self {
            metric: Arc::clone(&self.metric),
            region: Arc::clone(&self.region),
            current_value: self.current_value.clone(),
            timeseries: None,
        }
    }

    /// The category the current value falls into.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoCategories`] if the metric defines no categories.
    pub fn category(&self) -> Result<&Category> {
        match &self.current_value {
            Some(value) => self.metric.category(value),
            None if self.metric.has_categories() => self
                .metric
                .category_set()
                .map(|set| set.default_category())
                .ok_or_else(|| Error::NoCategories(self.metric.id().to_string())),
            None => Err(Error::NoCategories(self.metric.id().to_string())),
        }
    }

    #[must_use]
    pub fn format_value(&self, null_placeholder: &str) -> String {
        self.metric.format_value(self.current_value.as_ref(), null_placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CategorySets, DataReference, MetricDefinition};
    use crate::timeseries::TimeseriesPoint;
    use chrono::NaiveDate;

    fn data(timeseries: Option<Timeseries<MetricValue>>) -> MetricData {
        let metric = Metric::new(MetricDefinition::new("cases", DataReference::new("static")), &CategorySets::default()).unwrap();
        MetricData::new(Arc::new(metric), Arc::new(Region::new("06", "California")), Some(12.0.into()), timeseries)
    }

    #[test]
    fn test_missing_timeseries() {
        let d = data(None);
        assert!(!d.has_timeseries());
        assert!(matches!(d.timeseries(), Err(Error::MissingTimeseries { region, metric }) if region == "06" && metric == "cases"));
    }

    #[test]
    fn test_without_timeseries() {
        let ts = Timeseries::new([TimeseriesPoint::new(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), 12.0.into())]);
        let d = data(Some(ts));
        assert_eq!(d.timeseries().unwrap().len(), 1);

        let stripped = d.without_timeseries();
        assert!(!stripped.has_timeseries());
        assert_eq!(stripped.current_number(), Some(12.0));
        assert!(d.has_timeseries());
    }

    #[test]
    fn test_format_and_category() {
        let d = data(None);
        assert_eq!(d.format_value("-"), "12");
        assert!(matches!(d.category(), Err(Error::NoCategories(_))));
    }
}
