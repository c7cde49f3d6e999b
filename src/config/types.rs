use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Menu-Atlas
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Entry points of the crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Location directory root listing every region
    #[serde(rename = "directory-root")]
    pub directory_root: String,

    /// Catalog root; a store's catalog is this URL with `?store=<id>`
    #[serde(rename = "catalog-root")]
    pub catalog_root: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Concurrent workers for each directory stage
    #[serde(rename = "directory-workers", default = "default_directory_workers")]
    pub directory_workers: usize,

    /// Stores crawled concurrently in the catalog stage
    #[serde(rename = "store-workers", default = "default_store_workers")]
    pub store_workers: usize,

    /// Category sessions shared by all in-flight stores
    #[serde(rename = "category-workers", default = "default_category_workers")]
    pub category_workers: usize,

    /// Delay between sequential fetches to the same origin from one session (milliseconds)
    #[serde(rename = "polite-delay-ms", default = "default_polite_delay_ms")]
    pub polite_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Check robots.txt before fetching
    #[serde(rename = "respect-robots", default = "default_respect_robots")]
    pub respect_robots: bool,
}

impl CrawlerConfig {
    pub fn polite_delay(&self) -> Duration {
        Duration::from_millis(self.polite_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Applies command-line worker overrides in place
    pub fn apply_overrides(&mut self, overrides: &WorkerOverrides) {
        if let Some(n) = overrides.directory_workers {
            self.directory_workers = n;
        }
        if let Some(n) = overrides.store_workers {
            self.store_workers = n;
        }
        if let Some(n) = overrides.category_workers {
            self.category_workers = n;
        }
    }
}

fn default_directory_workers() -> usize {
    5
}

fn default_store_workers() -> usize {
    3
}

fn default_category_workers() -> usize {
    5
}

fn default_polite_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_respect_robots() -> bool {
    true
}

/// Worker counts given on the command line
#[derive(Debug, Clone, Default)]
pub struct WorkerOverrides {
    pub directory_workers: Option<usize>,
    pub store_workers: Option<usize>,
    pub category_workers: Option<usize>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root of checkpoints, exports and the merged table
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// SQLite run ledger; defaults to `<data-dir>/ledger.db`
    #[serde(rename = "ledger-path", default)]
    pub ledger_path: Option<PathBuf>,
}

impl OutputConfig {
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoints")
    }

    pub fn locations_dir(&self) -> PathBuf {
        self.data_dir.join("locations")
    }

    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join("menu.csv")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("ledger.db"))
    }
}
