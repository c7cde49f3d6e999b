//! Page fetching
//!
//! [`PageFetcher`] is the seam between the crawlers and the network. The
//! crawlers never hold a fetcher directly; they borrow a [`Session`] from a
//! bounded [`SessionPool`], which is what caps concurrent load.

mod http;
mod pool;

pub use http::{build_http_client, HttpFetcher};
pub use pool::{Session, SessionGuard, SessionPool};

use crate::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Retrieves the content of one page
///
/// Implementations may be a plain HTTP client or a scripted browser; callers
/// only see the page source or a classified [`FetchError`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// The fetcher to use for each kind of page
#[derive(Clone)]
pub struct Fetchers {
    /// Region, sub-region and store pages
    pub directory: Arc<dyn PageFetcher>,
    /// Catalog root and category pages
    pub catalog: Arc<dyn PageFetcher>,
    /// Item pages with customization options
    pub customization: Arc<dyn PageFetcher>,
}

impl Fetchers {
    /// Uses the same fetcher for every page kind
    pub fn uniform(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            directory: Arc::clone(&fetcher),
            catalog: Arc::clone(&fetcher),
            customization: fetcher,
        }
    }
}
