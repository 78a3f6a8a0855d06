use super::MetricDataProvider;
use crate::catalog::{MetricCatalog, MetricRef};
use crate::data::{MetricData, MultiRegionMultiMetricDataStore};
use crate::metrics::{Metric, MetricValue};
use crate::regions::Region;
use crate::timeseries::{DeltaOptions, RollingAverageOptions, Timeseries};
use crate::{Error, Result};
use async_trait::async_trait;
use core::fmt::Debug;
use std::collections::HashSet;
use std::sync::Arc;

const LOG_TARGET: &str = " transform";

/// Derives one metric's data from another's.
pub trait MetricTransform: Send + Sync + Debug {
    /// Produce the data of `new_metric` in `region` from the data of its source metric.
    ///
    /// `source` always carries its timeseries.
    ///
    /// # Errors
    ///
    /// Fails when the source data does not have the shape the transform needs.
    fn transform_data(&self, source: &MetricData, new_metric: &Arc<Metric>, region: &Arc<Region>) -> Result<MetricData>;
}

/// Serves metrics computed from other metrics of the same catalog.
///
/// Each metric served by this provider names its input in the `source_metric` field of its data
/// reference. The source metrics are fetched through the catalog, so chains of transforms compose
/// and every source keeps its own provider's caching.
#[derive(Debug)]
pub struct TransformProvider<T> {
    id: String,
    transform: T,
}

impl<T: MetricTransform> TransformProvider<T> {
    #[must_use]
    pub fn new(id: impl Into<String>, transform: T) -> Self {
        Self { id: id.into(), transform }
    }

    #[must_use]
    pub const fn transform(&self) -> &T {
        &self.transform
    }
}

fn source_metric_id(metric: &Metric) -> Result<String> {
    metric
        .data_reference()
        .require(metric.id(), "source_metric")?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidDataReference {
            metric: metric.id().to_string(),
            reason: "'source_metric' must be a metric id".to_string(),
        })
}

#[async_trait]
impl<T: MetricTransform> MetricDataProvider for TransformProvider<T> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_data(
        &self,
        regions: &[Arc<Region>],
        metrics: &[Arc<Metric>],
        _include_timeseries: bool,
        catalog: &MetricCatalog,
    ) -> Result<MultiRegionMultiMetricDataStore> {
        let sources = metrics
            .iter()
            .map(|m| source_metric_id(m).map(|source| (Arc::clone(m), source)))
            .collect::<Result<Vec<_>>>()?;

        let mut source_refs: Vec<MetricRef> = Vec::new();
        let mut seen = HashSet::new();
        for (_, source) in &sources {
            if seen.insert(source.as_str()) {
                source_refs.push(MetricRef::Id(source.clone()));
            }
        }

        log::debug!(target: LOG_TARGET, "Fetching {} source metric(s) for {} derived metric(s)", source_refs.len(), sources.len());

        // Transforms work on history, so sources are always fetched with their timeseries.
        let source_data = catalog.fetch_data_for_regions_and_metrics(regions, &source_refs, true).await?;

        let mut data = Vec::with_capacity(regions.len() * sources.len());
        for region in regions {
            for (metric, source) in &sources {
                let input = source_data.metric_data(&region.region_id, source)?;
                data.push(self.transform.transform_data(input, metric, region)?);
            }
        }

        Ok(MultiRegionMultiMetricDataStore::from_data(data))
    }
}

fn numeric_source(source: &MetricData) -> Result<Timeseries<f64>> {
    source.timeseries()?.assert_finite_numbers()
}

fn derived(series: &Timeseries<f64>, new_metric: &Arc<Metric>, region: &Arc<Region>) -> MetricData {
    let timeseries = Timeseries::<MetricValue>::from(&series.map_values(|v| new_metric.round_value(*v).unwrap_or(*v)));
    let current_value = timeseries.last_value().cloned();
    MetricData::new(Arc::clone(new_metric), Arc::clone(region), current_value, Some(timeseries))
}

/// Trailing rolling average of a numeric source series.
#[derive(Debug, Clone, Copy)]
pub struct RollingAverage {
    options: RollingAverageOptions,
}

impl RollingAverage {
    #[must_use]
    pub const fn new(options: RollingAverageOptions) -> Self {
        Self { options }
    }
}

impl MetricTransform for RollingAverage {
    fn transform_data(&self, source: &MetricData, new_metric: &Arc<Metric>, region: &Arc<Region>) -> Result<MetricData> {
        let averaged = numeric_source(source)?.rolling_average(self.options)?;
        Ok(derived(&averaged, new_metric, region))
    }
}

/// Day-over-day differences of a numeric source series.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deltas(pub DeltaOptions);

impl MetricTransform for Deltas {
    fn transform_data(&self, source: &MetricData, new_metric: &Arc<Metric>, region: &Arc<Region>) -> Result<MetricData> {
        let deltas = numeric_source(source)?.compute_deltas(self.0);
        Ok(derived(&deltas, new_metric, region))
    }
}
