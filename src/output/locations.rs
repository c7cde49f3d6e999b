//! Location export: per-region JSON files and a combined store list

use crate::checkpoint::{encode_key, write_json_atomic, CheckpointStore, CheckpointStoreExt, Stage};
use crate::model::{Region, RegionRecord, Store, SubRegion};
use crate::PersistError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionLocations {
    pub region: Region,
    pub sub_regions: Vec<SubRegionLocations>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubRegionLocations {
    pub sub_region: SubRegion,
    pub stores: Vec<Store>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub regions: usize,
    pub stores: usize,
    pub with_coordinates: usize,
}

/// Every resolved store, one per store id
///
/// Stores are visited in checkpoint key order; when two store pages resolve
/// to the same id the first one is kept.
pub fn resolved_stores(checkpoints: &dyn CheckpointStore) -> Result<Vec<Store>, PersistError> {
    let mut seen = HashSet::new();
    let mut stores = Vec::new();
    for (key, store) in checkpoints.load_stage::<Store>(Stage::Stores)? {
        if seen.insert(store.store_id.clone()) {
            stores.push(store);
        } else {
            tracing::debug!(page = %key, store_id = %store.store_id, "Duplicate store id ignored");
        }
    }
    Ok(stores)
}

/// Writes `<dir>/<region>.json` for every crawled region and
/// `combined_path` with every store that has coordinates
pub fn export_locations(
    checkpoints: &dyn CheckpointStore,
    dir: &Path,
    combined_path: &Path,
) -> Result<ExportSummary, PersistError> {
    let mut by_sub_region: HashMap<String, Vec<Store>> = HashMap::new();
    let stores = resolved_stores(checkpoints)?;
    for store in &stores {
        by_sub_region
            .entry(store.sub_region.clone())
            .or_default()
            .push(store.clone());
    }

    let mut summary = ExportSummary::default();
    for (key, record) in checkpoints.load_stage::<RegionRecord>(Stage::SubRegions)? {
        let sub_regions = record
            .sub_regions
            .into_iter()
            .map(|sub_region| {
                let stores = by_sub_region.remove(&sub_region.key()).unwrap_or_default();
                SubRegionLocations { sub_region, stores }
            })
            .collect();
        let locations = RegionLocations {
            region: record.region,
            sub_regions,
        };
        write_json_atomic(&region_path(dir, &key), &locations)?;
        summary.regions += 1;
    }

    let located: Vec<&Store> = stores.iter().filter(|s| s.coordinates.is_some()).collect();
    write_json_atomic(combined_path, &located)?;

    summary.stores = stores.len();
    summary.with_coordinates = located.len();
    tracing::info!(
        regions = summary.regions,
        stores = summary.stores,
        with_coordinates = summary.with_coordinates,
        "Locations exported"
    );
    Ok(summary)
}

fn region_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", encode_key(key)))
}
