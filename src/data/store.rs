use super::MetricData;
use crate::regions::Region;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Data for many metrics in a single region, keyed by metric id.
#[derive(Debug, Clone)]
pub struct MultiMetricDataStore {
    region: Arc<Region>,
    data: HashMap<String, MetricData>,
}

impl MultiMetricDataStore {
    /// Build a store; entries for other regions are ignored and later entries win.
    #[must_use]
    pub fn new(region: Arc<Region>, data: impl IntoIterator<Item = MetricData>) -> Self {
        let data = data
            .into_iter()
            .filter(|d| d.region().region_id == region.region_id)
            .map(|d| (d.metric().id().to_string(), d))
            .collect();

        Self { region, data }
    }

    #[must_use]
    pub fn empty(region: Arc<Region>) -> Self {
        Self {
            region,
            data: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn region(&self) -> &Arc<Region> {
        &self.region
    }

    #[must_use]
    pub fn get(&self, metric_id: &str) -> Option<&MetricData> {
        self.data.get(metric_id)
    }

    /// # Errors
    ///
    /// Fails with [`Error::MissingMetricData`] if the store holds nothing for `metric_id`.
    pub fn metric_data(&self, metric_id: &str) -> Result<&MetricData> {
        self.get(metric_id).ok_or_else(|| Error::MissingMetricData {
            region: self.region.region_id.clone(),
            metric: metric_id.to_string(),
        })
    }

    /// Whether the store can answer for `metric_id`, including history when `include_timeseries` is set.
    #[must_use]
    pub fn has_data(&self, metric_id: &str, include_timeseries: bool) -> bool {
        self.get(metric_id)
            .is_some_and(|d| !include_timeseries || d.has_timeseries())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricData> {
        self.data.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The union of both stores; `other` wins on collision.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut data = self.data.clone();
        data.extend(other.data.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            region: Arc::clone(&self.region),
            data,
        }
    }

    #[must_use]
    pub fn without_timeseries(&self) -> Self {
        Self {
            region: Arc::clone(&self.region),
            data: self
                .data
                .iter()
                .map(|(k, v)| (k.clone(), v.without_timeseries()))
                .collect(),
        }
    }
}

/// Data for many metrics across many regions, keyed by region id.
#[derive(Debug, Clone, Default)]
pub struct MultiRegionMultiMetricDataStore {
    regions: HashMap<String, MultiMetricDataStore>,
}

impl MultiRegionMultiMetricDataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group loose data by region; later entries win.
    #[must_use]
    pub fn from_data(data: impl IntoIterator<Item = MetricData>) -> Self {
        let mut regions: HashMap<String, MultiMetricDataStore> = HashMap::new();
        for d in data {
            let store = regions
                .entry(d.region().region_id.clone())
                .or_insert_with(|| MultiMetricDataStore::empty(Arc::clone(d.region())));
            let _ = store.data.insert(d.metric().id().to_string(), d);
        }

        Self { regions }
    }

    #[must_use]
    pub fn region(&self, region_id: &str) -> Option<&MultiMetricDataStore> {
        self.regions.get(region_id)
    }

    /// # Errors
    ///
    /// Fails with [`Error::MissingRegionData`] if the store holds nothing for `region_id`.
    pub fn region_data(&self, region_id: &str) -> Result<&MultiMetricDataStore> {
        self.region(region_id)
            .ok_or_else(|| Error::MissingRegionData(region_id.to_string()))
    }

    /// # Errors
    ///
    /// Fails with [`Error::MissingRegionData`] or [`Error::MissingMetricData`] when the pair is absent.
    pub fn metric_data(&self, region_id: &str, metric_id: &str) -> Result<&MetricData> {
        self.region_data(region_id)?.metric_data(metric_id)
    }

    #[must_use]
    pub fn has_data(&self, region_id: &str, metric_id: &str, include_timeseries: bool) -> bool {
        self.region(region_id)
            .is_some_and(|store| store.has_data(metric_id, include_timeseries))
    }

    pub fn regions(&self) -> impl Iterator<Item = &MultiMetricDataStore> {
        self.regions.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricData> {
        self.regions.values().flat_map(MultiMetricDataStore::iter)
    }

    /// Number of `(region, metric)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.values().map(MultiMetricDataStore::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.values().all(MultiMetricDataStore::is_empty)
    }

    /// The union of both stores; `other` wins on collision.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut regions = self.regions.clone();
        for (region_id, store) in &other.regions {
            let merged = regions
                .get(region_id)
                .map_or_else(|| store.clone(), |existing| existing.merge(store));
            let _ = regions.insert(region_id.clone(), merged);
        }

        Self { regions }
    }

    #[must_use]
    pub fn without_timeseries(&self) -> Self {
        Self {
            regions: self
                .regions
                .iter()
                .map(|(k, v)| (k.clone(), v.without_timeseries()))
                .collect(),
        }
    }
}

impl FromIterator<MetricData> for MultiRegionMultiMetricDataStore {
    fn from_iter<I: IntoIterator<Item = MetricData>>(iter: I) -> Self {
        Self::from_data(iter)
    }
}
