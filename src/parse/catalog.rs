//! Catalog pages
//!
//! The catalog is a Next.js site: every page embeds its data as JSON in
//! `<script id="__NEXT_DATA__">`, under `props.pageProps`.

use crate::model::{Category, Customization, ItemListing, MenuItem};
use crate::url::{resolve_link, with_query_param};
use crate::ParseError;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    #[serde(default)]
    page_props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageProps {
    product_categories: Option<Vec<RawCategory>>,
    products: Option<Vec<RawProduct>>,
    product: Option<RawProductDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategory {
    label: Option<String>,
    slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProduct {
    name: Option<String>,
    price: Option<RawPrice>,
    calories: Option<RawNumber>,
    image_url: Option<String>,
    slug: Option<String>,
    is_customizable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProductDetail {
    ingredients: Option<Vec<RawIngredient>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIngredient {
    name: Option<String>,
    price: Option<RawPrice>,
    calories: Option<RawNumber>,
}

/// Prices appear both as `{"value": 1.99}` and as a bare number or string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Object { value: Option<RawNumber> },
    Bare(RawNumber),
    Other(serde_json::Value),
}

impl RawPrice {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Object { value } => value.as_ref().and_then(RawNumber::as_f64),
            Self::Bare(n) => n.as_f64(),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawNumber {
    fn as_f64(&self) -> Option<f64> {
        let value: Option<f64> = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
            Self::Other(_) => None,
        };
        value.filter(|n| n.is_finite() && *n >= 0.0)
    }

    /// Calories are whole numbers; text such as `"370 Cal"` keeps its leading digits
    fn as_calories(&self) -> Option<u32> {
        match self {
            Self::Number(n) if n.is_finite() && *n >= 0.0 => Some(n.round() as u32),
            Self::Text(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }
}

/// Parses the catalog root into the store's categories
///
/// Category links are resolved against the page and pinned to `store_id`.
pub fn parse_categories(
    source: &str,
    page_url: &Url,
    store_id: &str,
) -> Result<Vec<Category>, ParseError> {
    let props = page_props(source, page_url)?;
    let raw = props
        .product_categories
        .ok_or_else(|| missing(page_url, "productCategories"))?;

    let mut categories: Vec<Category> = Vec::new();
    for category in raw {
        let (Some(name), Some(slug)) = (non_empty(category.label), non_empty(category.slug)) else {
            continue;
        };
        let Some(url) = resolve_link(page_url, &slug) else {
            continue;
        };
        let source_url = with_query_param(&url, "store", store_id).to_string();
        if categories.iter().any(|c| c.source_url == source_url) {
            continue;
        }
        categories.push(Category {
            name,
            source_url,
            store_id: store_id.to_string(),
        });
    }
    Ok(categories)
}

/// Parses a category page into its items
///
/// Products without a name or a price are skipped.
pub fn parse_items(
    source: &str,
    page_url: &Url,
    category: &Category,
) -> Result<Vec<ItemListing>, ParseError> {
    let props = page_props(source, page_url)?;
    let raw = props.products.ok_or_else(|| missing(page_url, "products"))?;

    let mut items = Vec::new();
    for product in raw {
        let Some(name) = non_empty(product.name) else {
            continue;
        };
        let Some(price) = product.price.as_ref().and_then(RawPrice::value) else {
            tracing::debug!(item = %name, page = %page_url, "Item without price skipped");
            continue;
        };

        let detail_url = non_empty(product.slug)
            .and_then(|slug| resolve_link(page_url, &slug))
            .map(|url| with_query_param(&url, "store", &category.store_id).to_string());

        items.push(ItemListing {
            item: MenuItem {
                name,
                price,
                calories: product.calories.as_ref().and_then(RawNumber::as_calories),
                image_url: non_empty(product.image_url),
                category_name: category.name.clone(),
                customizations: Vec::new(),
            },
            detail_url,
            customizable: product.is_customizable.unwrap_or(false),
        });
    }
    Ok(items)
}

/// Parses an item page into its customization options
pub fn parse_customizations(
    source: &str,
    page_url: &Url,
) -> Result<Option<Vec<Customization>>, ParseError> {
    let props = page_props(source, page_url)?;
    let Some(ingredients) = props.product.and_then(|p| p.ingredients) else {
        return Ok(None);
    };

    let options: Vec<Customization> = ingredients
        .into_iter()
        .filter_map(|raw| {
            Some(Customization {
                name: non_empty(raw.name)?,
                price: raw.price.as_ref().and_then(RawPrice::value),
                calories: raw.calories.as_ref().and_then(RawNumber::as_calories),
            })
        })
        .collect();

    Ok((!options.is_empty()).then_some(options))
}

fn page_props(source: &str, page_url: &Url) -> Result<PageProps, ParseError> {
    let document = Html::parse_document(source);
    let selector = Selector::parse("script#__NEXT_DATA__").map_err(|e| ParseError::Malformed {
        page: page_url.to_string(),
        message: e.to_string(),
    })?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| missing(page_url, "__NEXT_DATA__"))?;
    let json: String = script.text().collect();

    let data: NextData = serde_json::from_str(&json).map_err(|e| ParseError::Malformed {
        page: page_url.to_string(),
        message: e.to_string(),
    })?;
    Ok(data.props.page_props)
}

fn missing(page_url: &Url, what: &str) -> ParseError {
    ParseError::MissingStructure {
        page: page_url.to_string(),
        what: what.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
