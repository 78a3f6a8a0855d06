//! Metric definitions, categorization, and value formatting
//!
//! A [`Metric`] is built from a plain-data [`MetricDefinition`] and validated against the
//! known [`CategorySets`]. Once built, a metric knows how to grade a [`MetricValue`] into a
//! [`Category`], how to render it for display, and which provider serves its data (through its
//! [`DataReference`]).

mod category;
mod data_reference;
mod format;
mod metric;
mod metric_value;

pub use category::{Category, CategorySet, CategorySets};
pub use data_reference::DataReference;
pub use format::{FormatOptions, NumberStyle};
pub use metric::{Metric, MetricDefinition};
pub use metric_value::MetricValue;
