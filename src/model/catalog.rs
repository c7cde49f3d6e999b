use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One menu section of a store's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub source_url: String,
    pub store_id: String,
}

/// A purchasable item as listed on a category page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub calories: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub category_name: String,
    #[serde(default)]
    pub customizations: Vec<Customization>,
}

/// An optional modifier of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customization {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub calories: Option<u32>,
}

/// An item plus what its category page says about following it up
#[derive(Debug, Clone, PartialEq)]
pub struct ItemListing {
    pub item: MenuItem,
    pub detail_url: Option<String>,
    pub customizable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMenu {
    pub category: Category,
    pub items: Vec<MenuItem>,
}

/// A store's whole catalog, persisted as one checkpoint
///
/// Item names are unique across categories: when an item shows up in more
/// than one category it is kept only under the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMenu {
    pub store_id: String,
    pub display_name: String,
    pub categories: Vec<CategoryMenu>,
    /// Categories whose page could not be fetched or parsed
    #[serde(default)]
    pub failed_categories: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl StoreMenu {
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}
