use super::MetricDataProvider;
use crate::catalog::MetricCatalog;
use crate::data::{MetricData, MultiRegionMultiMetricDataStore};
use crate::metrics::{Metric, MetricValue};
use crate::regions::Region;
use crate::timeseries::{Timeseries, TimeseriesPoint};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use core::f64::consts::TAU;
use core::hash::{Hash, Hasher};
use core::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "      mock";
const DEFAULT_MIN_VALUE: f64 = 0.0;
const DEFAULT_MAX_VALUE: f64 = 100.0;
const NOISE_FRACTION: f64 = 0.05;

type CacheKey = (String, String);

/// Data reference fields understood by [`MockProvider`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MockReference {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    delay_ms: Option<u64>,
    error: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
}

/// Generates plausible looking daily series without any external source.
///
/// Every `(region, metric)` pair gets a noisy sine wave seeded from its ids, so repeated runs
/// produce identical data. Generated data is memoized: later requests for the same pair return
/// the same shared timeseries.
///
/// Data reference fields, all optional:
/// - `start_date` / `end_date`: the span of the series (defaults: 2022-01-01 to today)
/// - `min_value` / `max_value`: the value range (defaults to the metric's range, then 0 to 100)
/// - `delay_ms`: simulated latency per fetch
/// - `error`: fail the first fetch of each pair with this message
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    today: NaiveDate,
    cache: Mutex<HashMap<CacheKey, MetricData>>,
    failed_once: Mutex<HashSet<CacheKey>>,
}

impl MockProvider {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            today: Utc::now().date_naive(),
            cache: Mutex::new(HashMap::new()),
            failed_once: Mutex::new(HashSet::new()),
        }
    }

    /// Override the default end date of generated series.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn default_start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Marks every erroring pair of the batch, failing if any of them had not failed before.
    fn inject_failure(&self, regions: &[Arc<Region>], references: &[(&Arc<Metric>, MockReference)]) -> Result<()> {
        let mut failed_once = self.failed_once.lock().unwrap_or_else(PoisonError::into_inner);
        let mut failure = None;

        for (metric, reference) in references {
            let Some(message) = &reference.error else {
                continue;
            };

            for region in regions {
                let key = (region.region_id.clone(), metric.id().to_string());
                if failed_once.insert(key.clone()) && failure.is_none() {
                    failure = Some((key, message.clone()));
                }
            }
        }

        match failure {
            Some(((region, metric), message)) => {
                log::debug!(target: LOG_TARGET, "Injecting failure for metric '{metric}' in region '{region}'");
                Err(Error::InjectedFailure { region, metric, message })
            }
            None => Ok(()),
        }
    }

    fn data_for(&self, region: &Arc<Region>, metric: &Arc<Metric>, reference: &MockReference) -> MetricData {
        let key = (region.region_id.clone(), metric.id().to_string());

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(data) = cache.get(&key) {
            log::debug!(target: LOG_TARGET, "Cache hit for metric '{}' in region '{}'", key.1, key.0);
            return data.clone();
        }

        log::debug!(target: LOG_TARGET, "Generating data for metric '{}' in region '{}'", key.1, key.0);

        let timeseries = self.generate(region, metric, reference);
        let current_value = timeseries.last_value().cloned();
        let data = MetricData::new(Arc::clone(metric), Arc::clone(region), current_value, Some(timeseries));

        let _ = cache.insert(key, data.clone());
        data
    }

    fn generate(&self, region: &Region, metric: &Metric, reference: &MockReference) -> Timeseries<MetricValue> {
        let min = reference.min_value.or(metric.min_value()).unwrap_or(DEFAULT_MIN_VALUE);
        let max = reference.max_value.or(metric.max_value()).unwrap_or(DEFAULT_MAX_VALUE);
        let (min, max) = if min <= max { (min, max) } else { (max, min) };

        let start = reference.start_date.unwrap_or_else(Self::default_start_date);
        let end = reference.end_date.unwrap_or(self.today);

        let mut rng = StdRng::seed_from_u64(seed(&region.region_id, metric.id()));
        let period_days = rng.gen_range(30.0..365.0);
        let phase = rng.gen_range(0.0..TAU);
        let span = max - min;

        let points = start
            .iter_days()
            .take_while(|date| *date <= end)
            .zip(0u32..)
            .map(|(date, day)| {
                let wave = 0.5 + 0.5 * (TAU * f64::from(day) / period_days + phase).sin();
                let noise = rng.gen_range(-NOISE_FRACTION..=NOISE_FRACTION);
                let value = span.mul_add(wave + noise, min).clamp(min, max);
                let value = metric.round_value(value).unwrap_or(value);
                TimeseriesPoint::new(date, MetricValue::Number(value))
            });

        Timeseries::new(points)
    }
}

fn seed(region_id: &str, metric_id: &str) -> u64 {
    let mut hasher = FxHasher::default();
    region_id.hash(&mut hasher);
    metric_id.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl MetricDataProvider for MockProvider {
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
        let references = metrics
            .iter()
            .map(|m| m.data_reference().typed::<MockReference>(m.id()).map(|r| (m, r)))
            .collect::<Result<Vec<_>>>()?;

        let delay = references.iter().filter_map(|(_, r)| r.delay_ms).max().unwrap_or(0);
        if delay > 0 {
            log::debug!(target: LOG_TARGET, "Simulating {delay}ms of latency");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.inject_failure(regions, &references)?;

        let mut data = Vec::with_capacity(regions.len() * metrics.len());
        for region in regions {
            for (metric, reference) in &references {
                let d = self.data_for(region, metric, reference);
                data.push(if include_timeseries { d } else { d.without_timeseries() });
            }
        }

        Ok(MultiRegionMultiMetricDataStore::from_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOptions;
    use crate::metrics::{CategorySets, DataReference, MetricDefinition};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(reference: DataReference) -> (Arc<MockProvider>, MetricCatalog) {
        let provider = Arc::new(MockProvider::new("mock").with_today(date(2022, 3, 31)));
        let metric = Metric::new(MetricDefinition::new("m", reference), &CategorySets::default()).unwrap();
        let dyn_provider: Arc<dyn MetricDataProvider> = Arc::clone(&provider) as Arc<dyn MetricDataProvider>;
        let catalog = MetricCatalog::new([metric], [dyn_provider], CatalogOptions::default()).unwrap();
        (provider, catalog)
    }

    fn region(id: &str) -> Arc<Region> {
        Arc::new(Region::new(id, id))
    }

    #[tokio::test]
    async fn test_generates_series_within_range() {
        let (provider, catalog) = setup(DataReference::new("mock").with_field("min_value", 10.0).with_field("max_value", 20.0));
        let metrics = catalog.metrics().to_vec();

        let store = provider.fetch_data(&[region("06")], &metrics, true, &catalog).await.unwrap();
        let data = store.metric_data("06", "m").unwrap();
        let ts = data.timeseries().unwrap().assert_finite_numbers().unwrap();

        assert_eq!(ts.min_date(), Some(date(2022, 1, 1)));
        assert_eq!(ts.max_date(), Some(date(2022, 3, 31)));
        assert_eq!(ts.len(), 90);
        assert!(ts.values().all(|v| (10.0..=20.0).contains(v)));
        assert_eq!(data.current_number(), ts.last_value().copied());
    }

    #[tokio::test]
    async fn test_memoizes_per_pair() {
        let (provider, catalog) = setup(DataReference::new("mock"));
        let metrics = catalog.metrics().to_vec();

        let first = provider.fetch_data(&[region("06")], &metrics, true, &catalog).await.unwrap();
        let second = provider.fetch_data(&[region("06")], &metrics, true, &catalog).await.unwrap();

        let a = first.metric_data("06", "m").unwrap().shared_timeseries().unwrap();
        let b = second.metric_data("06", "m").unwrap().shared_timeseries().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[tokio::test]
    async fn test_deterministic_and_distinct_per_region() {
        let (provider, catalog) = setup(DataReference::new("mock"));
        let (other_provider, _) = setup(DataReference::new("mock"));
        let metrics = catalog.metrics().to_vec();

        let a = provider.fetch_data(&[region("06"), region("36")], &metrics, true, &catalog).await.unwrap();
        let b = other_provider.fetch_data(&[region("06")], &metrics, true, &catalog).await.unwrap();

        let series = |store: &MultiRegionMultiMetricDataStore, r: &str| store.metric_data(r, "m").unwrap().timeseries().unwrap().clone();
        assert_eq!(series(&a, "06"), series(&b, "06"));
        assert_ne!(series(&a, "06"), series(&a, "36"));
    }

    #[tokio::test]
    async fn test_injected_error_fails_once() {
        let (provider, catalog) = setup(DataReference::new("mock").with_field("error", "boom"));
        let metrics = catalog.metrics().to_vec();

        let err = provider.fetch_data(&[region("06")], &metrics, false, &catalog).await.unwrap_err();
        assert!(matches!(err, Error::InjectedFailure { ref message, .. } if message == "boom"));

        let store = provider.fetch_data(&[region("06")], &metrics, false, &catalog).await.unwrap();
        assert!(store.has_data("06", "m", false));
        assert!(!store.has_data("06", "m", true));
    }

    #[tokio::test]
    async fn test_injected_error_fails_once_per_batch() {
        let (provider, catalog) = setup(DataReference::new("mock").with_field("error", "boom"));
        let metrics = catalog.metrics().to_vec();
        let regions = [region("06"), region("36"), region("48")];

        let mut failures = 0;
        for _ in 0..4 {
            if provider.fetch_data(&regions, &metrics, false, &catalog).await.is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);

        // pairs first requested later still fail once on their own
        let err = provider.fetch_data(&[region("53")], &metrics, false, &catalog).await.unwrap_err();
        assert!(matches!(err, Error::InjectedFailure { ref region, .. } if region == "53"));
    }

    #[tokio::test]
    async fn test_explicit_dates() {
        let (provider, catalog) = setup(
            DataReference::new("mock")
                .with_field("start_date", "2023-01-01")
                .with_field("end_date", "2023-01-10"),
        );
        let metrics = catalog.metrics().to_vec();

        let store = provider.fetch_data(&[region("06")], &metrics, true, &catalog).await.unwrap();
        assert_eq!(store.metric_data("06", "m").unwrap().timeseries().unwrap().len(), 10);
    }

    #[test]
    fn test_seed_depends_on_both_ids() {
        assert_eq!(seed("06", "m"), seed("06", "m"));
        assert_ne!(seed("06", "m"), seed("36", "m"));
        assert_ne!(seed("06", "m"), seed("06", "n"));
    }
}
