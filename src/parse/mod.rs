//! Page parsing
//!
//! Turns fetched page source into typed records. Parsers never touch the
//! network or the disk; they return records, an empty list when the page has
//! no data, or a [`ParseError`] when the expected structure is absent.

mod catalog;
mod directory;

pub use catalog::{parse_categories, parse_customizations, parse_items};
pub use directory::{
    clean_name, parse_coordinates, parse_regions, parse_store_detail, parse_store_links,
    parse_sub_regions,
};

use crate::model::{Category, Customization, ItemListing, Region, Store, StoreLink, SubRegion};
use crate::ParseError;
use url::Url;

/// Extracts records from each kind of page
///
/// `page_url` is the URL the source was fetched from and is used to resolve
/// relative links.
pub trait PageParser: Send + Sync {
    fn parse_regions(&self, source: &str, page_url: &Url) -> Result<Vec<Region>, ParseError>;

    fn parse_sub_regions(
        &self,
        source: &str,
        page_url: &Url,
        region: &Region,
    ) -> Result<Vec<SubRegion>, ParseError>;

    fn parse_store_links(
        &self,
        source: &str,
        page_url: &Url,
        sub_region: &SubRegion,
    ) -> Result<Vec<StoreLink>, ParseError>;

    /// `None` when the page carries no store id
    fn parse_store_detail(
        &self,
        source: &str,
        page_url: &Url,
        link: &StoreLink,
    ) -> Result<Option<Store>, ParseError>;

    fn parse_categories(
        &self,
        source: &str,
        page_url: &Url,
        store_id: &str,
    ) -> Result<Vec<Category>, ParseError>;

    fn parse_items(
        &self,
        source: &str,
        page_url: &Url,
        category: &Category,
    ) -> Result<Vec<ItemListing>, ParseError>;

    /// `None` when the item page offers no customizations
    fn parse_customizations(
        &self,
        source: &str,
        page_url: &Url,
    ) -> Result<Option<Vec<Customization>>, ParseError>;
}

/// Parser for the store locator directory and the Next.js catalog pages
#[derive(Debug, Clone, Copy, Default)]
pub struct LocatorPageParser;

impl PageParser for LocatorPageParser {
    fn parse_regions(&self, source: &str, page_url: &Url) -> Result<Vec<Region>, ParseError> {
        parse_regions(source, page_url)
    }

    fn parse_sub_regions(
        &self,
        source: &str,
        page_url: &Url,
        region: &Region,
    ) -> Result<Vec<SubRegion>, ParseError> {
        parse_sub_regions(source, page_url, region)
    }

    fn parse_store_links(
        &self,
        source: &str,
        page_url: &Url,
        sub_region: &SubRegion,
    ) -> Result<Vec<StoreLink>, ParseError> {
        parse_store_links(source, page_url, sub_region)
    }

    fn parse_store_detail(
        &self,
        source: &str,
        page_url: &Url,
        link: &StoreLink,
    ) -> Result<Option<Store>, ParseError> {
        parse_store_detail(source, page_url, link)
    }

    fn parse_categories(
        &self,
        source: &str,
        page_url: &Url,
        store_id: &str,
    ) -> Result<Vec<Category>, ParseError> {
        parse_categories(source, page_url, store_id)
    }

    fn parse_items(
        &self,
        source: &str,
        page_url: &Url,
        category: &Category,
    ) -> Result<Vec<ItemListing>, ParseError> {
        parse_items(source, page_url, category)
    }

    fn parse_customizations(
        &self,
        source: &str,
        page_url: &Url,
    ) -> Result<Option<Vec<Customization>>, ParseError> {
        parse_customizations(source, page_url)
    }
}
