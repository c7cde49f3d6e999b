//! Per-origin robots.txt cache

use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Robots rules keyed by origin, shared by every session of a fetcher
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `url` against its origin's rules, fetching them on first use
    ///
    /// Concurrent first lookups for the same origin may both fetch; the last
    /// one stored wins, which is harmless.
    pub async fn is_allowed(&self, client: &Client, url: &Url, user_agent: &str) -> bool {
        let origin = crate::url::origin_key(url);

        if let Some(cached) = self.get_fresh(&origin) {
            return cached.content.is_allowed(url, user_agent);
        }

        let robots = fetch_robots(client, url).await;
        let allowed = robots.is_allowed(url, user_agent);
        self.insert(origin, CachedRobots::new(robots));
        allowed
    }

    pub fn insert(&self, origin: String, robots: CachedRobots) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(origin, robots);
        }
    }

    fn get_fresh(&self, origin: &str) -> Option<CachedRobots> {
        let entries = self.entries.lock().ok()?;
        entries.get(origin).filter(|c| !c.is_stale()).cloned()
    }
}
