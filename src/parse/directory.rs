//! Location directory pages
//!
//! Region and sub-region pages list their children as `a.DirLinks` inside a
//! `div.directory-container`. Sub-region pages link to store pages, and a
//! store page carries its store id in its ordering links.

use crate::model::{Coordinates, Region, Store, StoreLink, SubRegion};
use crate::url::{query_param, resolve_link};
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Parses the directory root into regions
pub fn parse_regions(source: &str, page_url: &Url) -> Result<Vec<Region>, ParseError> {
    Ok(directory_links(source, page_url)?
        .into_iter()
        .map(|(name, url)| Region {
            name,
            directory_url: url.to_string(),
        })
        .collect())
}

/// Parses a region page into its sub-regions
pub fn parse_sub_regions(
    source: &str,
    page_url: &Url,
    region: &Region,
) -> Result<Vec<SubRegion>, ParseError> {
    let region_key = region.key();
    Ok(directory_links(source, page_url)?
        .into_iter()
        .map(|(name, url)| SubRegion {
            name,
            directory_url: url.to_string(),
            region: region_key.clone(),
        })
        .collect())
}

/// Parses a sub-region page into links to its store pages
///
/// A store page is a same-host `.html` page at least three path segments
/// deep. Repeated links to the same page collapse into one entry.
pub fn parse_store_links(
    source: &str,
    page_url: &Url,
    sub_region: &SubRegion,
) -> Result<Vec<StoreLink>, ParseError> {
    let document = Html::parse_document(source);
    let anchors = selector("a[href]", page_url)?;
    let maps = selector(r#"a[href*="google.com/maps"]"#, page_url)?;

    let mut links: Vec<(StoreLink, bool)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for anchor in document.select(&anchors) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_link(page_url, href))
        else {
            continue;
        };
        if !is_store_page(&url, page_url) {
            continue;
        }

        let text = clean_name(&anchor.text().collect::<String>());
        let label = (!text.is_empty() && !is_generic_label(&text)).then_some(text);
        let directions = nearby_directions(anchor, &url, page_url, &anchors, &maps);

        match index.get(url.as_str()) {
            Some(&i) => {
                let (link, labelled) = &mut links[i];
                if !*labelled {
                    if let Some(label) = label {
                        link.display_name = label;
                        *labelled = true;
                    }
                }
                if link.directions_url.is_none() {
                    link.directions_url = directions;
                }
            }
            None => {
                index.insert(url.to_string(), links.len());
                let labelled = label.is_some();
                links.push((
                    StoreLink {
                        display_name: label.unwrap_or_else(|| name_from_slug(&url)),
                        source_url: url.to_string(),
                        directions_url: directions,
                        region: sub_region.region.clone(),
                        sub_region: sub_region.key(),
                    },
                    labelled,
                ));
            }
        }
    }

    Ok(links.into_iter().map(|(link, _)| link).collect())
}

/// Parses a store page into a store record
///
/// Returns `None` when no store id can be found on the page.
pub fn parse_store_detail(
    source: &str,
    page_url: &Url,
    link: &StoreLink,
) -> Result<Option<Store>, ParseError> {
    let document = Html::parse_document(source);
    let anchors = selector("a[href]", page_url)?;

    let mut store_id = None;
    let mut directions = None;
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if directions.is_none() && href.contains("google.com/maps") {
            directions = Some(href.to_string());
        }
        if store_id.is_none() {
            store_id = resolve_link(page_url, href)
                .and_then(|url| query_param(&url, "store"))
                .filter(|id| is_store_id(id));
        }
    }

    // Some pages only mention the id in embedded JSON-LD
    let Some(store_id) = store_id.or_else(|| scan_store_param(source)) else {
        return Ok(None);
    };

    let coordinates = directions
        .as_deref()
        .and_then(parse_coordinates)
        .or_else(|| link.directions_url.as_deref().and_then(parse_coordinates));

    Ok(Some(Store {
        store_id,
        display_name: link.display_name.clone(),
        source_url: link.source_url.clone(),
        coordinates,
        region: link.region.clone(),
        sub_region: link.sub_region.clone(),
    }))
}

/// Reads `lat,lng` from the `destination` parameter of a directions link
pub fn parse_coordinates(directions_url: &str) -> Option<Coordinates> {
    let url = Url::parse(directions_url).ok()?;
    let destination = query_param(&url, "destination")?;
    let (lat, lng) = destination.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;

    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Some(Coordinates { lat, lng })
    } else {
        None
    }
}

/// Trims a link label and drops a trailing listing count such as `(12)`
pub fn clean_name(raw: &str) -> String {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(open) = name.rfind('(') {
        let count = &name[open + 1..];
        if let Some(digits) = count.strip_suffix(')') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return name[..open].trim_end().to_string();
            }
        }
    }
    name
}

fn directory_links(source: &str, page_url: &Url) -> Result<Vec<(String, Url)>, ParseError> {
    let document = Html::parse_document(source);
    let container = selector("div.directory-container", page_url)?;
    let dir_links = selector("a.DirLinks[href]", page_url)?;

    let mut containers = document.select(&container).peekable();
    if containers.peek().is_none() {
        return Err(ParseError::MissingStructure {
            page: page_url.to_string(),
            what: "directory listing".to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for container in containers {
        for anchor in container.select(&dir_links) {
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| resolve_link(page_url, href))
            else {
                continue;
            };
            let name = clean_name(&anchor.text().collect::<String>());
            if name.is_empty() {
                continue;
            }
            if seen.insert(url.to_string()) {
                out.push((name, url));
            }
        }
    }
    Ok(out)
}

fn selector(css: &str, page_url: &Url) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Malformed {
        page: page_url.to_string(),
        message: format!("selector {}: {}", css, e),
    })
}

fn is_store_page(url: &Url, page_url: &Url) -> bool {
    let depth = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0);

    url.host_str() == page_url.host_str()
        && url.path().ends_with(".html")
        && depth >= 3
        && url.path() != page_url.path()
}

fn is_generic_label(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("store page") || lower.contains("store details") || lower == "details"
}

fn is_store_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn scan_store_param(source: &str) -> Option<String> {
    source.match_indices("store=").find_map(|(i, m)| {
        let digits: String = source[i + m.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        is_store_id(&digits).then_some(digits)
    })
}

/// Looks for a directions link in the anchor's card (parent or grandparent)
///
/// Stops at the first ancestor that also links to a different store page,
/// since that ancestor is a listing rather than a single card.
fn nearby_directions(
    anchor: ElementRef<'_>,
    store_url: &Url,
    page_url: &Url,
    anchors: &Selector,
    maps: &Selector,
) -> Option<String> {
    let mut node = anchor.parent();
    for _ in 0..2 {
        let element = ElementRef::wrap(node?)?;
        let other_store = element.select(anchors).any(|a| {
            a.value()
                .attr("href")
                .and_then(|href| resolve_link(page_url, href))
                .is_some_and(|u| &u != store_url && is_store_page(&u, page_url))
        });
        if other_store {
            return None;
        }
        if let Some(link) = element.select(maps).next() {
            return link.value().attr("href").map(str::to_string);
        }
        node = element.parent();
    }
    None
}

fn name_from_slug(url: &Url) -> String {
    let slug = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let slug = slug.strip_suffix(".html").unwrap_or(slug);

    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
