use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a metric's data comes from: a provider id plus fields only that provider interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReference {
    pub provider_id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DataReference {
    #[must_use]
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a field the provider cannot work without.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MissingDataReferenceField`] if the field is absent or `null`.
    pub fn require(&self, metric_id: &str, field: &str) -> Result<&Value> {
        self.fields
            .get(field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::MissingDataReferenceField {
                metric: metric_id.to_string(),
                provider: self.provider_id.clone(),
                field: field.to_string(),
            })
    }

    /// Decode the provider-specific fields into a typed configuration.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidDataReference`] if the fields do not match `T`.
    pub fn typed<T: DeserializeOwned>(&self, metric_id: &str) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| Error::InvalidDataReference {
            metric: metric_id.to_string(),
            reason: e.to_string(),
        })
    }
}
