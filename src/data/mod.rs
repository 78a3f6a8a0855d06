//! Fetched metric values and the immutable stores that hold them

mod metric_data;
mod store;

pub use metric_data::MetricData;
pub use store::{MultiMetricDataStore, MultiRegionMultiMetricDataStore};
