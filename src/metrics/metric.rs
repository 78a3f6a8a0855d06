use super::format::round_to;
use super::{Category, CategorySet, CategorySets, DataReference, FormatOptions, MetricValue, NumberStyle};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Plain-data description of a metric, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricDefinition {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_name: Option<String>,

    #[serde(default)]
    pub format_options: FormatOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_set_id: Option<String>,

    /// Cut points between consecutive categories, strictly ascending or strictly descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_thresholds: Option<Vec<f64>>,

    /// One discrete value per category, in category order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_values: Option<Vec<MetricValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    pub data_reference: DataReference,
}

impl MetricDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, data_reference: DataReference) -> Self {
        Self {
            id: id.into(),
            name: None,
            extended_name: None,
            format_options: FormatOptions::default(),
            category_set_id: None,
            category_thresholds: None,
            category_values: None,
            min_value: None,
            max_value: None,
            data_reference,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn with_format_options(mut self, format_options: FormatOptions) -> Self {
        self.format_options = format_options;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, category_set_id: impl Into<String>, thresholds: Vec<f64>) -> Self {
        self.category_set_id = Some(category_set_id.into());
        self.category_thresholds = Some(thresholds);
        self
    }

    #[must_use]
    pub fn with_values(mut self, category_set_id: impl Into<String>, values: Vec<MetricValue>) -> Self {
        self.category_set_id = Some(category_set_id.into());
        self.category_values = Some(values);
        self
    }

    #[must_use]
    pub const fn with_range(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = Some(min_value);
        self.max_value = Some(max_value);
        self
    }
}

/// A validated metric: static metadata plus the rules to grade and format its values.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    def: MetricDefinition,
    category_set: Option<Arc<CategorySet>>,
}

impl Metric {
    /// Validate a definition against the known category sets.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidMetric`] when thresholds and values are both set, when the
    /// category set is missing or unknown, when the threshold or value count does not match the
    /// category count, when thresholds are not strictly monotonic, or when `min_value > max_value`.
    pub fn new(def: MetricDefinition, category_sets: &CategorySets) -> Result<Self> {
        let id = def.id.as_str();

        if let (Some(min), Some(max)) = (def.min_value, def.max_value)
            && min > max
        {
            return Err(Error::invalid_metric(id, format!("min_value {min} exceeds max_value {max}")));
        }

        if def.category_thresholds.is_some() && def.category_values.is_some() {
            return Err(Error::invalid_metric(id, "category_thresholds and category_values are mutually exclusive"));
        }

        let category_set = match &def.category_set_id {
            Some(set_id) => Some(Arc::clone(
                category_sets
                    .get(set_id)
                    .ok_or_else(|| Error::invalid_metric(id, format!("unknown category set '{set_id}'")))?,
            )),
            None => None,
        };

        let category_count = category_set.as_ref().map_or(0, |set| set.categories().len());

        if let Some(thresholds) = &def.category_thresholds {
            if category_set.is_none() {
                return Err(Error::invalid_metric(id, "category_thresholds require a category_set_id"));
            }

            if thresholds.len() + 1 != category_count {
                return Err(Error::invalid_metric(
                    id,
                    format!("expected {} thresholds for {category_count} categories, found {}", category_count.saturating_sub(1), thresholds.len()),
                ));
            }

            if !is_strictly_monotonic(thresholds) {
                return Err(Error::invalid_metric(id, "category_thresholds must be strictly ascending or strictly descending"));
            }
        }

        if let Some(values) = &def.category_values {
            if category_set.is_none() {
                return Err(Error::invalid_metric(id, "category_values require a category_set_id"));
            }

            if values.len() != category_count {
                return Err(Error::invalid_metric(
                    id,
                    format!("expected {category_count} category values, found {}", values.len()),
                ));
            }
        }

        Ok(Self { def, category_set })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.def.id
    }

    /// The display name, falling back to the id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.def.name.as_deref().unwrap_or(&self.def.id)
    }

    /// The long-form display name, falling back to [`Self::name`].
    #[must_use]
    pub fn extended_name(&self) -> &str {
        self.def.extended_name.as_deref().unwrap_or_else(|| self.name())
    }

    #[must_use]
    pub const fn definition(&self) -> &MetricDefinition {
        &self.def
    }

    #[must_use]
    pub const fn format_options(&self) -> &FormatOptions {
        &self.def.format_options
    }

    #[must_use]
    pub const fn data_reference(&self) -> &DataReference {
        &self.def.data_reference
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.def.data_reference.provider_id
    }

    #[must_use]
    pub const fn min_value(&self) -> Option<f64> {
        self.def.min_value
    }

    #[must_use]
    pub const fn max_value(&self) -> Option<f64> {
        self.def.max_value
    }

    #[must_use]
    pub fn category_set(&self) -> Option<&CategorySet> {
        self.category_set.as_deref()
    }

    #[must_use]
    pub fn has_categories(&self) -> bool {
        self.def.category_thresholds.is_some() || self.def.category_values.is_some()
    }

    /// Grade `value` into one of the metric's categories.
    ///
    /// With thresholds, a value equal to a threshold gets the benefit of the doubt and lands in
    /// the less severe category: ascending thresholds compare with `<=`, descending ones with
    /// `>=`. Values past the last threshold get the last category. Values that are not finite
    /// numbers get the default category.
    ///
    /// With discrete values, the category at the position of the equal value is returned, or
    /// the default category if nothing matches.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoCategories`] if the metric has neither thresholds nor values.
    pub fn category(&self, value: &MetricValue) -> Result<&Category> {
        let set = match (&self.category_set, self.has_categories()) {
            (Some(set), true) => set,
            _ => return Err(Error::NoCategories(self.def.id.clone())),
        };

        let index = if let Some(thresholds) = &self.def.category_thresholds {
            let Some(x) = value.as_finite_number() else {
                return Ok(set.default_category());
            };

            let ascending = thresholds.len() < 2 || thresholds[0] < thresholds[1];
            Some(
                thresholds
                    .iter()
                    .position(|&t| if ascending { x <= t } else { x >= t })
                    .unwrap_or(thresholds.len()),
            )
        } else {
            self.def
                .category_values
                .as_ref()
                .and_then(|values| values.iter().position(|v| v == value))
        };

        Ok(index
            .and_then(|i| set.categories().get(i))
            .unwrap_or_else(|| set.default_category()))
    }

    /// The color of the category `value` falls into.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoCategories`] if the metric has neither thresholds nor values.
    pub fn color(&self, value: &MetricValue) -> Result<&str> {
        self.category(value).map(|c| c.color.as_str())
    }

    /// Render a value for display.
    ///
    /// Metrics with discrete category values show the matched category's name. Otherwise text
    /// passes through unchanged, missing and non-finite values become `null_placeholder`, and
    /// numbers are formatted with the metric's [`FormatOptions`].
    #[must_use]
    pub fn format_value(&self, value: Option<&MetricValue>, null_placeholder: &str) -> String {
        let Some(value) = value else {
            return null_placeholder.to_string();
        };

        if self.def.category_values.is_some() {
            return self
                .category(value)
                .map_or_else(|_| null_placeholder.to_string(), |c| c.display_name().to_string());
        }

        if let MetricValue::Text(text) = value {
            return text.clone();
        }

        value
            .as_finite_number()
            .map_or_else(|| null_placeholder.to_string(), |n| self.def.format_options.format(n))
    }

    /// Round to the configured fraction digits.
    ///
    /// Percent metrics keep two extra digits since display multiplies them by 100.
    #[must_use]
    pub fn round_value(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }

        let options = &self.def.format_options;
        let digits = match options.style {
            NumberStyle::Decimal => options.effective_maximum_fraction_digits(),
            NumberStyle::Percent => options.effective_maximum_fraction_digits() + 2,
        };

        Some(round_to(value, digits))
    }
}

fn is_strictly_monotonic(thresholds: &[f64]) -> bool {
    if thresholds.iter().any(|t| !t.is_finite()) {
        return false;
    }

    thresholds.windows(2).all(|w| w[0] < w[1]) || thresholds.windows(2).all(|w| w[0] > w[1])
}
