use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level directory grouping, e.g. a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub directory_url: String,
}

impl Region {
    /// Checkpoint key, derived from the directory page path
    pub fn key(&self) -> String {
        key_of(&self.directory_url, &self.name)
    }
}

/// Second-level grouping within a region, e.g. a county or city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRegion {
    pub name: String,
    pub directory_url: String,
    /// Key of the owning region
    pub region: String,
}

impl SubRegion {
    pub fn key(&self) -> String {
        key_of(&self.directory_url, &self.name)
    }
}

/// A region together with the sub-regions listed on its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region: Region,
    pub sub_regions: Vec<SubRegion>,
}

/// A store page link found on a sub-region page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLink {
    pub display_name: String,
    pub source_url: String,
    /// Directions link listed next to the store, if any
    #[serde(default)]
    pub directions_url: Option<String>,
    pub region: String,
    pub sub_region: String,
}

impl StoreLink {
    pub fn key(&self) -> String {
        key_of(&self.source_url, &self.display_name)
    }
}

/// A sub-region together with the store links listed on its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRegionRecord {
    pub sub_region: SubRegion,
    pub stores: Vec<StoreLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A resolved store location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,
    pub display_name: String,
    pub source_url: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub region: String,
    pub sub_region: String,
}

fn key_of(url: &str, fallback: &str) -> String {
    match Url::parse(url) {
        Ok(url) => crate::url::page_key(&url),
        Err(_) => fallback.trim().to_lowercase(),
    }
}
