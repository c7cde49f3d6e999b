//! HTTP fetcher implementation
//!
//! Builds the reqwest client with the crawler's user agent and maps every
//! failure onto a [`FetchError`] class.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::fetch::PageFetcher;
use crate::robots::RobotsCache;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The user agent reads `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let ua = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(ua)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over HTTP, optionally honoring robots.txt
pub struct HttpFetcher {
    client: Client,
    robots: Option<RobotsCache>,
    agent_token: String,
}

impl HttpFetcher {
    pub fn new(client: Client, respect_robots: bool, agent_token: impl Into<String>) -> Self {
        Self {
            client,
            robots: respect_robots.then(RobotsCache::new),
            agent_token: agent_token.into(),
        }
    }

    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler.request_timeout())?;
        Ok(Self::new(
            client,
            crawler.respect_robots,
            user_agent.crawler_name.clone(),
        ))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&self.client, url, &self.agent_token).await {
                return Err(FetchError::Blocked {
                    url: url.to_string(),
                    reason: "disallowed by robots.txt".to_string(),
                });
            }
        }

        tracing::trace!(url = %url, "GET");
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if let Some(err) = classify_status(url, status) {
            return Err(err);
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, &e))
    }
}

/// Maps a non-success HTTP status to a fetch error class
///
/// | Status | Class |
/// |--------|-------|
/// | 404, 410 | NotFound |
/// | 401, 403, 429 | Blocked |
/// | 408, 504 | Timeout |
/// | anything else | Transient |
fn classify_status(url: &Url, status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let url = url.to_string();
    Some(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound { url },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            FetchError::Blocked {
                url,
                reason: format!("HTTP {}", status.as_u16()),
            }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FetchError::Timeout { url },
        _ => FetchError::Transient {
            url,
            message: format!("HTTP {}", status.as_u16()),
        },
    })
}

fn classify_request_error(url: &Url, e: &reqwest::Error) -> FetchError {
    let url = url.to_string();
    if e.is_timeout() {
        FetchError::Timeout { url }
    } else if e.is_connect() {
        FetchError::Transient {
            url,
            message: "connection failed".to_string(),
        }
    } else {
        FetchError::Transient {
            url,
            message: e.to_string(),
        }
    }
}
