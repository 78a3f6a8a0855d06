//! Precomputed bulk datasets
//!
//! A [`Snapshot`] captures the output of earlier fetches so a catalog can serve those
//! `(region, metric)` pairs without calling any provider. Snapshots are plain JSON:
//!
//! ```json
//! {
//!   "metadata": { "created_at": "2024-03-01T00:00:00Z" },
//!   "data": {
//!     "06": {
//!       "cases": { "current_value": 12, "timeseries": { "points": [{ "date": "2024-03-01", "value": 12 }] } }
//!     }
//!   }
//! }
//! ```

use crate::data::{MetricData, MultiRegionMultiMetricDataStore};
use crate::metrics::{Metric, MetricValue};
use crate::regions::Region;
use crate::timeseries::Timeseries;
use crate::{Error, Result};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

const LOG_TARGET: &str = "  snapshot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
}

/// The stored data of one `(region, metric)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub current_value: Option<MetricValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries: Option<Arc<Timeseries<MetricValue>>>,
}

/// Precomputed metric data, keyed by region id then metric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    metadata: SnapshotMetadata,
    data: BTreeMap<String, BTreeMap<String, SnapshotEntry>>,
}

impl Snapshot {
    #[must_use]
    pub fn from_store(store: &MultiRegionMultiMetricDataStore, created_at: DateTime<Utc>) -> Self {
        let mut data: BTreeMap<String, BTreeMap<String, SnapshotEntry>> = BTreeMap::new();
        for d in store.iter() {
            let entry = SnapshotEntry {
                current_value: d.current_value().cloned(),
                timeseries: d.shared_timeseries().map(Arc::clone),
            };

            let _ = data
                .entry(d.region().region_id.clone())
                .or_default()
                .insert(d.metric().id().to_string(), entry);
        }

        Self {
            metadata: SnapshotMetadata { created_at },
            data,
        }
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    #[must_use]
    pub fn entry(&self, region_id: &str, metric_id: &str) -> Option<&SnapshotEntry> {
        self.data.get(region_id)?.get(metric_id)
    }

    /// The snapshot's data for the requested pairs; pairs the snapshot lacks are left out.
    #[must_use]
    pub fn store_for(&self, regions: &[Arc<Region>], metrics: &[Arc<Metric>]) -> MultiRegionMultiMetricDataStore {
        regions
            .iter()
            .flat_map(|region| {
                metrics.iter().filter_map(|metric| {
                    self.entry(&region.region_id, metric.id()).map(|entry| {
                        MetricData::with_shared_timeseries(
                            Arc::clone(metric),
                            Arc::clone(region),
                            entry.current_value.clone(),
                            entry.timeseries.as_ref().map(Arc::clone),
                        )
                    })
                })
            })
            .collect()
    }

    /// # Errors
    ///
    /// Fails with [`Error::Serialize`] if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialize {
            what: "snapshot".to_string(),
            reason: e.to_string(),
        })
    }

    /// # Errors
    ///
    /// Fails with [`Error::Parse`] on malformed JSON, including `null` series values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::parse("snapshot", e))
    }

    /// Read a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Config`] if the file cannot be read, and with [`Error::Parse`] if it
    /// cannot be decoded.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::Config(format!("unable to read snapshot from {path}: {e}")))?;
        let snapshot = Self::from_json(&text)?;

        log::info!(target: LOG_TARGET, "Loaded snapshot '{path}' created at {}", snapshot.created_at());
        Ok(snapshot)
    }

    /// Write the snapshot to a JSON file.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Serialize`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|e| Error::Serialize {
            what: format!("snapshot file '{path}'"),
            reason: e.to_string(),
        })
    }
}
