use super::MetricDataProvider;
use crate::catalog::MetricCatalog;
use crate::data::{MetricData, MultiRegionMultiMetricDataStore};
use crate::metrics::{Metric, MetricValue};
use crate::regions::Region;
use crate::timeseries::{Timeseries, TimeseriesPoint};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

const LOG_TARGET: &str = "    static";

/// Serves the constant `value` field of each metric's data reference, for every region.
#[derive(Debug, Clone)]
pub struct StaticValueProvider {
    id: String,
    today: NaiveDate,
}

impl StaticValueProvider {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            today: Utc::now().date_naive(),
        }
    }

    /// Override the date of the single point in generated series.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn value_for(metric: &Metric) -> Result<MetricValue> {
        let raw = metric.data_reference().require(metric.id(), "value")?;
        MetricValue::from_json(raw).ok_or_else(|| Error::InvalidDataReference {
            metric: metric.id().to_string(),
            reason: format!("'value' must be a number, boolean, or string, found {raw}"),
        })
    }
}

#[async_trait]
impl MetricDataProvider for StaticValueProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_data(
        &self,
        regions: &[Arc<Region>],
        metrics: &[Arc<Metric>],
        include_timeseries: bool,
        _catalog: &MetricCatalog,
    ) -> Result<MultiRegionMultiMetricDataStore> {
        log::debug!(target: LOG_TARGET, "Serving {} metric(s) for {} region(s)", metrics.len(), regions.len());

        let values = metrics
            .iter()
            .map(|m| Self::value_for(m).map(|v| (m, v)))
            .collect::<Result<Vec<_>>>()?;

        let data = regions.iter().flat_map(|region| {
            values.iter().map(|(metric, value)| {
                let timeseries = include_timeseries.then(|| Timeseries::new([TimeseriesPoint::new(self.today, value.clone())]));
                MetricData::new(Arc::clone(metric), Arc::clone(region), Some(value.clone()), timeseries)
            })
        });

        Ok(MultiRegionMultiMetricDataStore::from_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOptions;
    use crate::metrics::{CategorySets, DataReference, MetricDefinition};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn catalog(reference: DataReference) -> MetricCatalog {
        let metric = Metric::new(MetricDefinition::new("constant", reference), &CategorySets::default()).unwrap();
        let provider: Arc<dyn MetricDataProvider> = Arc::new(StaticValueProvider::new("static").with_today(today()));
        MetricCatalog::new([metric], [provider], CatalogOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_value_for_every_region() {
        let catalog = catalog(DataReference::new("static").with_field("value", 42));
        let regions = [Arc::new(Region::new("06", "California")), Arc::new(Region::new("36", "New York"))];

        let store = catalog
            .fetch_data_for_regions_and_metrics(&regions, &["constant".into()], true)
            .await
            .unwrap();

        for region in &regions {
            let data = store.metric_data(&region.region_id, "constant").unwrap();
            assert_eq!(data.current_number(), Some(42.0));

            let ts = data.timeseries().unwrap();
            assert_eq!(ts.len(), 1);
            assert_eq!(ts.last().map(|p| p.date), Some(today()));
        }
    }

    #[tokio::test]
    async fn test_missing_value_field() {
        let catalog = catalog(DataReference::new("static"));
        let region = Arc::new(Region::new("06", "California"));

        let err = catalog.fetch_data(&region, "constant", false).await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingDataReferenceField { metric, provider, field } if metric == "constant" && provider == "static" && field == "value"
        ));
    }

    #[tokio::test]
    async fn test_rejects_structured_value() {
        let catalog = catalog(DataReference::new("static").with_field("value", serde_json::json!([1, 2])));
        let region = Arc::new(Region::new("06", "California"));

        let err = catalog.fetch_data(&region, "constant", false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDataReference { .. }));
    }
}
