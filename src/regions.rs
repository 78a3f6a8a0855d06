use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A geographic entity metrics are measured for.
///
/// Only `region_id` takes part in comparisons; the other fields are carried for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub region_id: String,
    pub full_name: String,
    pub short_name: String,

    #[serde(default)]
    pub population: u64,
}

impl Region {
    #[must_use]
    pub fn new(region_id: impl Into<String>, full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        Self {
            region_id: region_id.into(),
            short_name: full_name.clone(),
            full_name,
            population: 0,
        }
    }

    #[must_use]
    pub const fn with_population(mut self, population: u64) -> Self {
        self.population = population;
        self
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.region_id == other.region_id
    }
}

impl Eq for Region {}

/// Directory of known regions, addressable by id.
#[derive(Debug, Clone, Default)]
pub struct RegionDb {
    regions: Vec<Arc<Region>>,
    by_id: HashMap<String, usize>,
}

impl RegionDb {
    /// Build a directory; later duplicates of a region id replace earlier ones.
    #[must_use]
    pub fn new(regions: impl IntoIterator<Item = Region>) -> Self {
        let mut db = Self::default();
        for region in regions {
            if let Some(&index) = db.by_id.get(&region.region_id) {
                db.regions[index] = Arc::new(region);
            } else {
                let _ = db.by_id.insert(region.region_id.clone(), db.regions.len());
                db.regions.push(Arc::new(region));
            }
        }

        db
    }

    #[must_use]
    pub fn find_by_region_id(&self, region_id: &str) -> Option<&Arc<Region>> {
        self.by_id.get(region_id).map(|&i| &self.regions[i])
    }

    /// # Errors
    ///
    /// Fails with [`Error::UnknownRegion`] if no region has this id.
    pub fn find_by_region_id_strict(&self, region_id: &str) -> Result<&Arc<Region>> {
        self.find_by_region_id(region_id)
            .ok_or_else(|| Error::UnknownRegion(region_id.to_string()))
    }

    #[must_use]
    pub fn all(&self) -> &[Arc<Region>] {
        &self.regions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
