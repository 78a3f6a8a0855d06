use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// A labeled, colored bucket used to grade metric values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Category {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Any CSS color string.
    pub color: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Category {
    #[must_use]
    pub fn new(id: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            color: color.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name shown to users, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// An ordered list of categories plus the category used for values that fit none of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategorySetDefinition", into = "CategorySetDefinition")]
pub struct CategorySet {
    id: String,
    categories: Vec<Category>,
    default_category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySetDefinition {
    id: String,
    categories: Vec<Category>,
    default_category: Category,
}

impl TryFrom<CategorySetDefinition> for CategorySet {
    type Error = Error;

    fn try_from(def: CategorySetDefinition) -> Result<Self> {
        Self::new(def.id, def.categories, def.default_category)
    }
}

impl From<CategorySet> for CategorySetDefinition {
    fn from(set: CategorySet) -> Self {
        Self {
            id: set.id,
            categories: set.categories,
            default_category: set.default_category,
        }
    }
}

impl CategorySet {
    /// # Errors
    ///
    /// Fails with [`Error::InvalidCategorySet`] if `categories` is empty or contains duplicate ids.
    pub fn new(id: impl Into<String>, categories: Vec<Category>, default_category: Category) -> Result<Self> {
        let id = id.into();
        if categories.is_empty() {
            return Err(Error::InvalidCategorySet {
                category_set: id,
                reason: "no categories".to_string(),
            });
        }

        for (i, category) in categories.iter().enumerate() {
            if categories[..i].iter().any(|c| c.id == category.id) {
                return Err(Error::InvalidCategorySet {
                    category_set: id,
                    reason: format!("duplicate category id '{}'", category.id),
                });
            }
        }

        Ok(Self {
            id,
            categories,
            default_category,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub const fn default_category(&self) -> &Category {
        &self.default_category
    }

    #[must_use]
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// Category sets addressable by id.
#[derive(Debug, Clone, Default)]
pub struct CategorySets {
    sets: HashMap<String, Arc<CategorySet>>,
}

impl CategorySets {
    /// # Errors
    ///
    /// Fails with [`Error::InvalidCategorySet`] if two sets share an id.
    pub fn new(sets: impl IntoIterator<Item = CategorySet>) -> Result<Self> {
        let mut map = HashMap::new();
        for set in sets {
            match map.entry(set.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(Error::InvalidCategorySet {
                        category_set: set.id,
                        reason: "duplicate category set id".to_string(),
                    });
                }
                Entry::Vacant(entry) => {
                    let _ = entry.insert(Arc::new(set));
                }
            }
        }

        Ok(Self { sets: map })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<CategorySet>> {
        self.sets.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> CategorySet {
        CategorySet::new(
            "levels",
            vec![Category::new("low", "#00d474"), Category::new("high", "#ff0034")],
            Category::new("unknown", "#cccccc"),
        )
        .unwrap()
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(Category::new("low", "green").display_name(), "low");
        assert_eq!(Category::new("low", "green").with_name("Low").display_name(), "Low");
    }

    #[test]
    fn test_rejects_empty_set() {
        let result = CategorySet::new("empty", vec![], Category::new("unknown", "grey"));
        assert!(matches!(result, Err(Error::InvalidCategorySet { .. })));
    }

    #[test]
    fn test_rejects_duplicate_category_ids() {
        let result = CategorySet::new(
            "dupes",
            vec![Category::new("a", "red"), Category::new("a", "blue")],
            Category::new("unknown", "grey"),
        );
        assert!(matches!(result, Err(Error::InvalidCategorySet { reason, .. }) if reason.contains("'a'")));
    }

    #[test]
    fn test_lookup() {
        let set = levels();
        assert_eq!(set.category("high").map(|c| c.color.as_str()), Some("#ff0034"));
        assert!(set.category("medium").is_none());
        assert_eq!(set.default_category().id, "unknown");
    }

    #[test]
    fn test_registry_rejects_duplicate_ids() {
        assert!(CategorySets::new([levels(), levels()]).is_err());

        let sets = CategorySets::new([levels()]).unwrap();
        assert_eq!(sets.len(), 1);
        assert!(sets.get("levels").is_some());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r##"{"id":"x","categories":[],"default_category":{"id":"u","color":"#000"}}"##;
        assert!(serde_json::from_str::<CategorySet>(json).is_err());

        let json = r##"{"id":"x","categories":[{"id":"a","color":"#111"}],"default_category":{"id":"u","color":"#000"}}"##;
        let set: CategorySet = serde_json::from_str(json).unwrap();
        assert_eq!(set.categories().len(), 1);
    }
}
