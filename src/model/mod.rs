//! Records produced by the crawl
//!
//! Location records form a tree (Region → SubRegion → Store); catalog records
//! form a tree per store (Category → MenuItem → Customization). Parents are
//! referenced by key so every record can be checkpointed on its own.

mod catalog;
mod location;

pub use catalog::{Category, CategoryMenu, Customization, ItemListing, MenuItem, StoreMenu};
pub use location::{
    Coordinates, Region, RegionRecord, Store, StoreLink, SubRegion, SubRegionRecord,
};
