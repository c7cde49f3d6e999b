//! Shared fixtures: an in-memory site and page builders

#![allow(dead_code)]

use async_trait::async_trait;
use menu_atlas::config::CrawlerConfig;
use menu_atlas::fetch::PageFetcher;
use menu_atlas::FetchError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub const DIRECTORY_ROOT: &str = "https://locations.example.com/index.html";
pub const CATALOG_ROOT: &str = "https://www.example.com/food";

#[derive(Clone)]
enum Page {
    Body(String, Duration),
    Fail(FetchError),
}

/// A site served from memory that records every request
#[derive(Default)]
pub struct FakeSite {
    pages: Mutex<HashMap<String, Page>>,
    hits: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, url: &str, body: impl Into<String>) {
        self.delayed(url, body, 0);
    }

    pub fn delayed(&self, url: &str, body: impl Into<String>, delay_ms: u64) {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            Page::Body(body.into(), Duration::from_millis(delay_ms)),
        );
    }

    pub fn fail(&self, url: &str) {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            Page::Fail(FetchError::Transient {
                url: url.to_string(),
                message: "HTTP 503".to_string(),
            }),
        );
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_matching(&self, needle: &str) -> usize {
        self.hits().iter().filter(|u| u.contains(needle)).count()
    }

    pub fn clear_hits(&self) {
        self.hits.lock().unwrap().clear();
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.hits.lock().unwrap().push(url.to_string());
        let page = self.pages.lock().unwrap().get(url.as_str()).cloned();
        match page {
            Some(Page::Body(body, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            }
            Some(Page::Fail(e)) => Err(e),
            None => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
        }
    }
}

pub fn crawler_config(workers: usize) -> CrawlerConfig {
    CrawlerConfig {
        directory_workers: workers,
        store_workers: workers,
        category_workers: workers,
        polite_delay_ms: 0,
        request_timeout_secs: 5,
        respect_robots: false,
    }
}

/// A region or sub-region page listing `links` as (href, name)
pub fn directory_page(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, name)| format!(r#"<li><a class="DirLinks" href="{}">{} (1)</a></li>"#, href, name))
        .collect();
    format!(
        r#"<html><body><div class="directory-container"><ul>{}</ul></div></body></html>"#,
        items
    )
}

/// A sub-region page linking to store pages given as (href, name)
pub fn store_list_page(stores: &[(&str, &str)]) -> String {
    let items: String = stores
        .iter()
        .map(|(href, name)| format!(r#"<li><a href="{}">{}</a></li>"#, href, name))
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

/// A store page carrying its id in an ordering link
pub fn store_page(store_id: &str, lat: f64, lng: f64) -> String {
    format!(
        r#"<html><body>
            <a href="https://www.example.com/food?store={}">Order Now</a>
            <a href="https://www.google.com/maps/dir/?api=1&destination={},{}">Get Directions</a>
        </body></html>"#,
        store_id, lat, lng
    )
}

pub fn next_page(page_props: &str) -> String {
    format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{}}}}}</script></body></html>"#,
        page_props
    )
}

/// Catalog root listing category slugs
pub fn catalog_page(categories: &[&str]) -> String {
    let list: Vec<String> = categories
        .iter()
        .map(|c| format!(r#"{{"label":"{}","slug":"/food/{}"}}"#, c, c))
        .collect();
    next_page(&format!(r#"{{"productCategories":[{}]}}"#, list.join(",")))
}

/// Category page listing (name, price)
pub fn category_page(items: &[(&str, f64)]) -> String {
    let list: Vec<String> = items
        .iter()
        .map(|(name, price)| format!(r#"{{"name":"{}","price":{{"value":{}}}}}"#, name, price))
        .collect();
    next_page(&format!(r#"{{"products":[{}]}}"#, list.join(",")))
}

pub fn catalog_url(store_id: &str) -> String {
    format!("{}?store={}", CATALOG_ROOT, store_id)
}

pub fn category_url(category: &str, store_id: &str) -> String {
    format!("{}/{}?store={}", CATALOG_ROOT, category, store_id)
}
