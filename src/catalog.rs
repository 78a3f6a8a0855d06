//! The metric registry and fetch orchestrator
//!
//! A [`MetricCatalog`] owns a fixed set of metrics and the providers that serve them. Its job
//! is to answer "give me these metrics for these regions" while doing as little work as
//! possible:
//!
//! 1. pairs already covered by a configured [`Snapshot`] are served from it;
//! 2. the remaining pairs are grouped by provider, so each provider is called at most once per
//!    request, and all providers of a request run concurrently;
//! 3. the results are merged and, when history was not asked for, stripped of their timeseries.
//!
//! Provider errors propagate unchanged; the first failing provider fails the whole request.

use crate::data::{MetricData, MultiMetricDataStore, MultiRegionMultiMetricDataStore};
use crate::metrics::Metric;
use crate::providers::MetricDataProvider;
use crate::regions::Region;
use crate::snapshot::Snapshot;
use crate::{Error, Result};
use core::sync::atomic::{AtomicU64, Ordering};
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const LOG_TARGET: &str = "   catalog";

/// Identifies a metric of a catalog, either by id or by the shared metric itself.
#[derive(Debug, Clone)]
pub enum MetricRef {
    Id(String),

    /// Must be the very `Arc` handed out by the catalog.
    Metric(Arc<Metric>),
}

impl MetricRef {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Metric(metric) => metric.id(),
        }
    }
}

impl From<&str> for MetricRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for MetricRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Arc<Metric>> for MetricRef {
    fn from(metric: Arc<Metric>) -> Self {
        Self::Metric(metric)
    }
}

impl From<&Arc<Metric>> for MetricRef {
    fn from(metric: &Arc<Metric>) -> Self {
        Self::Metric(Arc::clone(metric))
    }
}

/// Optional catalog behavior.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    /// Precomputed data consulted before any provider.
    pub snapshot: Option<Arc<Snapshot>>,
}

impl CatalogOptions {
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(Arc::new(snapshot));
        self
    }
}

/// The work assigned to one provider in one request.
struct ProviderTask<'a> {
    provider: &'a Arc<dyn MetricDataProvider>,
    regions: Vec<Arc<Region>>,
    metrics: Vec<Arc<Metric>>,
}

/// A registry of metrics and the providers that serve them.
#[derive(Debug)]
pub struct MetricCatalog {
    metrics: Vec<Arc<Metric>>,
    metrics_by_id: HashMap<String, Arc<Metric>>,
    providers: HashMap<String, Arc<dyn MetricDataProvider>>,
    options: CatalogOptions,
    data_fetches_count: AtomicU64,
}

impl MetricCatalog {
    /// Build a catalog.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateMetric`] or [`Error::DuplicateProvider`] on repeated ids, and
    /// with [`Error::UnknownProvider`] if a metric names a provider that was not supplied.
    pub fn new(
        metrics: impl IntoIterator<Item = Metric>,
        providers: impl IntoIterator<Item = Arc<dyn MetricDataProvider>>,
        options: CatalogOptions,
    ) -> Result<Self> {
        let mut providers_by_id: HashMap<String, Arc<dyn MetricDataProvider>> = HashMap::new();
        for provider in providers {
            let id = provider.id().to_string();
            if providers_by_id.contains_key(&id) {
                return Err(Error::DuplicateProvider(id));
            }
            let _ = providers_by_id.insert(id, provider);
        }

        let mut ordered = Vec::new();
        let mut metrics_by_id = HashMap::new();
        for metric in metrics {
            if metrics_by_id.contains_key(metric.id()) {
                return Err(Error::DuplicateMetric(metric.id().to_string()));
            }

            if !providers_by_id.contains_key(metric.provider_id()) {
                return Err(Error::UnknownProvider {
                    metric: metric.id().to_string(),
                    provider: metric.provider_id().to_string(),
                });
            }

            let metric = Arc::new(metric);
            let _ = metrics_by_id.insert(metric.id().to_string(), Arc::clone(&metric));
            ordered.push(metric);
        }

        log::debug!(target: LOG_TARGET, "Created catalog with {} metric(s) and {} provider(s)", ordered.len(), providers_by_id.len());

        Ok(Self {
            metrics: ordered,
            metrics_by_id,
            providers: providers_by_id,
            options,
            data_fetches_count: AtomicU64::new(0),
        })
    }

    /// All metrics, in registration order.
    #[must_use]
    pub fn metrics(&self) -> &[Arc<Metric>] {
        &self.metrics
    }

    #[must_use]
    pub fn metric(&self, id: &str) -> Option<&Arc<Metric>> {
        self.metrics_by_id.get(id)
    }

    /// # Errors
    ///
    /// Fails with [`Error::UnknownMetric`] for an unknown id, and with
    /// [`Error::MetricNotFromThisCatalog`] for a metric this catalog did not create.
    pub fn metric_by_ref(&self, metric: &MetricRef) -> Result<Arc<Metric>> {
        match metric {
            MetricRef::Id(id) => self
                .metric(id)
                .map(Arc::clone)
                .ok_or_else(|| Error::UnknownMetric(id.clone())),
            MetricRef::Metric(m) => self
                .metric(m.id())
                .filter(|own| Arc::ptr_eq(own, m))
                .map(Arc::clone)
                .ok_or_else(|| Error::MetricNotFromThisCatalog(m.id().to_string())),
        }
    }

    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&Arc<dyn MetricDataProvider>> {
        self.providers.get(id)
    }

    #[must_use]
    pub const fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// The number of fetch requests this catalog has received, including failed ones.
    #[must_use]
    pub fn data_fetches_count(&self) -> u64 {
        self.data_fetches_count.load(Ordering::Relaxed)
    }

    /// Fetch one metric for one region.
    ///
    /// The request is counted when this is called, before the returned future is polled.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::fetch_data_for_regions_and_metrics`], and with
    /// [`Error::MissingMetricData`] if the provider returned nothing for the pair.
    pub fn fetch_data(
        &self,
        region: &Arc<Region>,
        metric: impl Into<MetricRef>,
        include_timeseries: bool,
    ) -> impl Future<Output = Result<MetricData>> + Send {
        self.count_fetch();
        let region = Arc::clone(region);
        let metric = metric.into();

        async move {
            let store = self
                .fetch_uncounted(core::slice::from_ref(&region), core::slice::from_ref(&metric), include_timeseries)
                .await?;

            store.metric_data(&region.region_id, metric.id()).cloned()
        }
    }

    /// Fetch several metrics for one region.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::fetch_data_for_regions_and_metrics`].
    pub fn fetch_data_for_metrics<'a>(
        &'a self,
        region: &Arc<Region>,
        metrics: &'a [MetricRef],
        include_timeseries: bool,
    ) -> impl Future<Output = Result<MultiMetricDataStore>> + Send {
        self.count_fetch();
        let region = Arc::clone(region);

        async move {
            let store = self
                .fetch_uncounted(core::slice::from_ref(&region), metrics, include_timeseries)
                .await?;

            Ok(store
                .region(&region.region_id)
                .cloned()
                .unwrap_or_else(|| MultiMetricDataStore::empty(Arc::clone(&region))))
        }
    }

    /// Fetch every requested metric for every requested region.
    ///
    /// The request is counted when this is called, before the returned future is polled.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownMetric`] or [`Error::MetricNotFromThisCatalog`] for bad metric
    /// references, and with the first error reported by any provider.
    pub fn fetch_data_for_regions_and_metrics<'a>(
        &'a self,
        regions: &'a [Arc<Region>],
        metrics: &'a [MetricRef],
        include_timeseries: bool,
    ) -> impl Future<Output = Result<MultiRegionMultiMetricDataStore>> + Send {
        self.count_fetch();
        self.fetch_uncounted(regions, metrics, include_timeseries)
    }

    fn count_fetch(&self) {
        let _ = self.data_fetches_count.fetch_add(1, Ordering::Relaxed);
    }

    async fn fetch_uncounted(
        &self,
        regions: &[Arc<Region>],
        metrics: &[MetricRef],
        include_timeseries: bool,
    ) -> Result<MultiRegionMultiMetricDataStore> {
        let metrics = dedup_by_key(
            metrics.iter().map(|m| self.metric_by_ref(m)).collect::<Result<Vec<_>>>()?,
            |m| m.id().to_string(),
        );
        let regions = dedup_by_key(regions.to_vec(), |r| r.region_id.clone());

        let seeded = self
            .options
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.store_for(&regions, &metrics))
            .unwrap_or_default();

        let tasks = self.plan(&regions, &metrics, &seeded, include_timeseries);
        if !seeded.is_empty() {
            log::debug!(target: LOG_TARGET, "Served {} pair(s) from snapshot", seeded.len());
        }

        let fetched = try_join_all(tasks.iter().map(|task| {
            log::debug!(
                target: LOG_TARGET,
                "Fetching {} metric(s) for {} region(s) from provider '{}'",
                task.metrics.len(),
                task.regions.len(),
                task.provider.id()
            );
            task.provider.fetch_data(&task.regions, &task.metrics, include_timeseries, self)
        }))
        .await?;

        let merged = fetched.iter().fold(seeded, |acc, store| acc.merge(store));

        Ok(if include_timeseries { merged } else { merged.without_timeseries() })
    }

    /// Group the pairs not covered by `seeded` by provider, keeping the request's order.
    fn plan<'a>(
        &'a self,
        regions: &[Arc<Region>],
        metrics: &[Arc<Metric>],
        seeded: &MultiRegionMultiMetricDataStore,
        include_timeseries: bool,
    ) -> Vec<ProviderTask<'a>> {
        let mut groups: Vec<(&'a Arc<dyn MetricDataProvider>, Vec<Arc<Metric>>, HashSet<&str>)> = Vec::new();

        for metric in metrics {
            let missing: Vec<&str> = regions
                .iter()
                .filter(|r| !seeded.has_data(&r.region_id, metric.id(), include_timeseries))
                .map(|r| r.region_id.as_str())
                .collect();

            if missing.is_empty() {
                continue;
            }

            // `new` guarantees every metric's provider is registered
            let Some(provider) = self.providers.get(metric.provider_id()) else {
                continue;
            };

            if let Some((_, group_metrics, group_regions)) = groups.iter_mut().find(|(p, _, _)| p.id() == provider.id()) {
                group_metrics.push(Arc::clone(metric));
                group_regions.extend(missing);
            } else {
                groups.push((provider, vec![Arc::clone(metric)], missing.into_iter().collect()));
            }
        }

        groups
            .into_iter()
            .map(|(provider, metrics, missing)| ProviderTask {
                provider,
                regions: regions
                    .iter()
                    .filter(|r| missing.contains(r.region_id.as_str()))
                    .map(Arc::clone)
                    .collect(),
                metrics,
            })
            .collect()
    }
}

fn dedup_by_key<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
