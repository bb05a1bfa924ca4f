use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::artifact::Persisted;
use crate::normalize::normalize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Continent '{requested}' not found. Available: {available:?}")]
    UnknownContinent {
        requested: String,
        available: Vec<String>,
    },
}

/// Continent → countries lookup built from the training records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionCatalog {
    regions: BTreeMap<String, Vec<String>>,
}

impl RegionCatalog {
    /// Values are normalized; pairs with an empty side are skipped.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (region, country) in pairs {
            let region = normalize(region.as_ref());
            let country = normalize(country.as_ref());
            if region.is_empty() || country.is_empty() {
                continue;
            }
            grouped.entry(region).or_default().insert(country);
        }

        let regions = grouped
            .into_iter()
            .map(|(region, countries)| (region, countries.into_iter().collect()))
            .collect();
        Self { regions }
    }

    pub fn continents(&self) -> Vec<String> {
        self.regions.keys().cloned().collect()
    }

    /// Countries for a continent, looked up by its normalized name.
    pub fn countries(&self, continent: &str) -> Result<(String, &[String]), CatalogError> {
        let key = normalize(continent);
        match self.regions.get(&key) {
            Some(countries) => Ok((key, countries.as_slice())),
            None => Err(CatalogError::UnknownContinent {
                requested: key,
                available: self.continents(),
            }),
        }
    }

    pub fn contains(&self, region: &str, country: &str) -> bool {
        self.regions
            .get(region)
            .is_some_and(|countries| countries.binary_search_by(|c| c.as_str().cmp(country)).is_ok())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn total_countries(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }
}

impl Persisted for RegionCatalog {
    const KIND: &'static str = "region_catalog";

    fn validate(&self) -> Result<(), String> {
        for (region, countries) in &self.regions {
            if !countries.windows(2).all(|w| w[0] < w[1]) {
                return Err(format!("countries for {region} are not sorted and distinct"));
            }
        }
        Ok(())
    }
}
