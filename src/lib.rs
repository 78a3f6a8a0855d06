//! Metric catalog, pluggable data providers, and timeseries algebra
//!
//! This crate serves *metrics* (named, typed, time-varying measurements about geographic
//! regions) to visualization code. It has three layers:
//!
//! - [`timeseries`]: immutable, date-indexed series with windowing, rolling averages, deltas,
//!   and type narrowing.
//! - [`metrics`]: metric definitions, value categorization, and display formatting.
//! - [`catalog`] and [`providers`]: a registry of metrics whose data comes from pluggable
//!   [`MetricDataProvider`](providers::MetricDataProvider)s, fetched with as little redundant
//!   work as possible.
//!
//! # Example
//!
//! ```no_run
//! use metric_catalog::catalog::{CatalogOptions, MetricCatalog};
//! use metric_catalog::metrics::{CategorySets, DataReference, Metric, MetricDefinition};
//! use metric_catalog::providers::{MetricDataProvider, MockProvider};
//! use metric_catalog::regions::Region;
//! use std::sync::Arc;
//!
//! # async fn example() -> metric_catalog::Result<()> {
//! let metric = Metric::new(MetricDefinition::new("cases", DataReference::new("mock")), &CategorySets::default())?;
//! let providers: Vec<Arc<dyn MetricDataProvider>> = vec![Arc::new(MockProvider::new("mock"))];
//! let catalog = MetricCatalog::new([metric], providers, CatalogOptions::default())?;
//!
//! let california = Arc::new(Region::new("06", "California"));
//! let data = catalog.fetch_data(&california, "cases", true).await?;
//! println!("{}", data.format_value("-"));
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger. Each module uses its
//! own log target, so output can be filtered per component.

pub mod catalog;
pub mod config;
pub mod data;
pub mod metrics;
pub mod providers;
pub mod regions;
pub mod snapshot;
pub mod timeseries;

mod error;

pub use error::Error;

/// Result type alias using [`Error`] as the default error type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
