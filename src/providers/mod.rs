//! The data provider protocol and the providers shipped with the crate
//!
//! A provider knows how to turn `(region, metric)` pairs into [`MetricData`](crate::data::MetricData).
//! Each metric names its provider through its [`DataReference`](crate::metrics::DataReference), and
//! the [`MetricCatalog`] routes every request to the right provider, calling each provider at most
//! once per catalog request.
//!
//! Providers must be idempotent: asking twice for the same pairs yields the same data. They are
//! free to memoize expensive work (parsed tables, generated series) across calls.
//!
//! | Provider | Source |
//! |---|---|
//! | [`StaticValueProvider`] | a constant `value` in the data reference |
//! | [`MockProvider`] | deterministic generated series, for demos and tests |
//! | [`TransformProvider`] | another metric of the same catalog, run through a [`MetricTransform`] |
//! | [`TabularProvider`] | wide CSV, long CSV, or JSON rows from a URL or inline text |

mod mock;
mod resilient_http;
mod static_value;
mod tabular;
mod transform;

pub use mock::MockProvider;
pub use resilient_http::ResilientClient;
pub use static_value::StaticValueProvider;
pub use tabular::{TableFormat, TableSource, TabularProvider};
pub use transform::{Deltas, MetricTransform, RollingAverage, TransformProvider};

use crate::Result;
use crate::catalog::MetricCatalog;
use crate::data::MultiRegionMultiMetricDataStore;
use crate::metrics::Metric;
use crate::regions::Region;
use async_trait::async_trait;
use core::fmt::Debug;
use std::sync::Arc;

/// A pluggable source of metric data.
#[async_trait]
pub trait MetricDataProvider: Send + Sync + Debug {
    /// The id metrics use in their data reference to select this provider.
    fn id(&self) -> &str;

    /// Fetch every `(region, metric)` pair of the cross product.
    ///
    /// `catalog` is the catalog issuing the request, which lets derived providers ask for the
    /// metrics they are computed from.
    async fn fetch_data(
        &self,
        regions: &[Arc<Region>],
        metrics: &[Arc<Metric>],
        include_timeseries: bool,
        catalog: &MetricCatalog,
    ) -> Result<MultiRegionMultiMetricDataStore>;
}
