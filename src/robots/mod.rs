//! Robots.txt handling module
//!
//! Fetches robots.txt once per origin, caches it for a day, and answers
//! whether a URL may be fetched.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::{Client, StatusCode};
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// A missing file or any error reading it yields [`ParsedRobots::allow_all`].
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let Ok(robots_url) = url.join("/robots.txt") else {
        return ParsedRobots::allow_all();
    };

    match client.get(robots_url.as_str()).send().await {
        Ok(response) if response.status() == StatusCode::OK => match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "Unreadable robots.txt body");
                ParsedRobots::allow_all()
            }
        },
        Ok(response) => {
            tracing::debug!(url = %robots_url, status = %response.status(), "No robots.txt");
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::debug!(url = %robots_url, error = %e, "robots.txt fetch failed");
            ParsedRobots::allow_all()
        }
    }
}
