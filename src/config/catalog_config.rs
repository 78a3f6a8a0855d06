use crate::catalog::{CatalogOptions, MetricCatalog};
use crate::metrics::{CategorySet, CategorySets, Metric, MetricDefinition};
use crate::providers::MetricDataProvider;
use crate::{Error, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

const LOG_TARGET: &str = "    config";

/// Metric and category set definitions, as stored in a TOML, YAML, or JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default)]
    pub category_sets: Vec<CategorySet>,

    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
}

impl CatalogConfig {
    /// Load a configuration, picking the format from the file extension.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Config`] if the file cannot be read or has an unsupported extension,
    /// and with [`Error::Parse`] if its content does not describe a valid configuration.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::Config(format!("unable to read configuration from {path}: {e}")))?;

        let config: Self = match path.extension().unwrap_or_default() {
            "toml" => toml::from_str(&text).map_err(|e| Error::parse(format!("TOML configuration from {path}"), e))?,
            "yml" | "yaml" => serde_yaml::from_str(&text).map_err(|e| Error::parse(format!("YAML configuration from {path}"), e))?,
            "json" => serde_json::from_str(&text).map_err(|e| Error::parse(format!("JSON configuration from {path}"), e))?,
            extension => return Err(Error::Config(format!("unsupported configuration file extension: '{extension}'"))),
        };

        log::info!(
            target: LOG_TARGET,
            "Loaded {} metric(s) and {} category set(s) from {path}",
            config.metrics.len(),
            config.category_sets.len()
        );

        Ok(config)
    }

    /// Write the configuration, picking the format from the file extension.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Config`] on an unsupported extension or a failed write, and with
    /// [`Error::Serialize`] if the configuration cannot be represented in the chosen format.
    pub fn save(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        let serialize_error = |format: &str, reason: String| Error::Serialize {
            what: format!("{format} configuration to {path}"),
            reason,
        };

        let text = match path.extension().unwrap_or_default() {
            "toml" => toml::to_string_pretty(self).map_err(|e| serialize_error("TOML", e.to_string()))?,
            "yml" | "yaml" => serde_yaml::to_string(self).map_err(|e| serialize_error("YAML", e.to_string()))?,
            "json" => serde_json::to_string_pretty(self).map_err(|e| serialize_error("JSON", e.to_string()))?,
            extension => return Err(Error::Config(format!("unsupported configuration file extension: '{extension}'"))),
        };

        fs::write(path, text).map_err(|e| Error::Config(format!("unable to write configuration to {path}: {e}")))
    }

    /// Validate every definition and build a catalog served by `providers`.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid category set or metric, and like [`MetricCatalog::new`].
    pub fn into_catalog(
        self,
        providers: impl IntoIterator<Item = Arc<dyn MetricDataProvider>>,
        options: CatalogOptions,
    ) -> Result<MetricCatalog> {
        let category_sets = CategorySets::new(self.category_sets)?;
        let metrics = self
            .metrics
            .into_iter()
            .map(|def| Metric::new(def, &category_sets))
            .collect::<Result<Vec<_>>>()?;

        MetricCatalog::new(metrics, providers, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricValue, NumberStyle};
    use crate::providers::StaticValueProvider;
    use camino::Utf8PathBuf;

    const TOML: &str = r##"
[[category_sets]]
id = "risk"
categories = [
    { id = "low", name = "Low", color = "#00d474" },
    { id = "high", name = "High", color = "#ff0034" },
]
default_category = { id = "unknown", color = "#cccccc" }

[[metrics]]
id = "cases"
name = "Cases per 100k"
category_set_id = "risk"
category_thresholds = [10.0]
format_options = { style = "percent", maximum_fraction_digits = 1 }
data_reference = { provider_id = "static", value = 0.25 }
"##;

    const YAML: &str = r##"
category_sets:
  - id: flags
    categories:
      - { id: off, color: grey }
      - { id: on, color: green }
    default_category: { id: unknown, color: white }
metrics:
  - id: enabled
    category_set_id: flags
    category_values: [false, true]
    data_reference:
      provider_id: static
      value: true
"##;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn providers() -> Vec<Arc<dyn MetricDataProvider>> {
        vec![Arc::new(StaticValueProvider::new("static"))]
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(write(&dir, "catalog.toml", TOML)).unwrap();

        assert_eq!(config.category_sets.len(), 1);
        let metric = &config.metrics[0];
        assert_eq!(metric.format_options.style, NumberStyle::Percent);
        assert_eq!(metric.data_reference.provider_id, "static");

        let catalog = config.into_catalog(providers(), CatalogOptions::default()).unwrap();
        let cases = catalog.metric("cases").unwrap();
        assert_eq!(cases.name(), "Cases per 100k");
        assert_eq!(cases.category(&MetricValue::from(10.0)).unwrap().id, "low");
        assert_eq!(cases.format_value(Some(&0.1234.into()), "-"), "12.3%");
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(write(&dir, "catalog.yaml", YAML)).unwrap();

        let catalog = config.into_catalog(providers(), CatalogOptions::default()).unwrap();
        let enabled = catalog.metric("enabled").unwrap();
        assert_eq!(enabled.color(&true.into()).unwrap(), "green");
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "catalog.toml", "[[metrics]]\nid = \"x\"\ncolour = \"red\"\ndata_reference = { provider_id = \"static\" }\n");
        assert!(matches!(CatalogConfig::load(path), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "catalog.ini", "");
        assert!(matches!(CatalogConfig::load(path), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(CatalogConfig::load("does/not/exist.toml"), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_metric_fails_catalog_build() {
        let dir = tempfile::tempdir().unwrap();
        let text = TOML.replace("category_thresholds = [10.0]", "category_thresholds = [10.0, 20.0]");
        let config = CatalogConfig::load(write(&dir, "catalog.toml", &text)).unwrap();

        let err = config.into_catalog(providers(), CatalogOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidMetric { metric, .. } if metric == "cases"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(write(&dir, "catalog.yaml", YAML)).unwrap();

        for name in ["out.yaml", "out.json"] {
            let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
            config.save(&path).unwrap();
            assert_eq!(CatalogConfig::load(&path).unwrap(), config);
        }
    }
}
