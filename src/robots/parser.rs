use robotstxt::DefaultMatcher;
use url::Url;

/// Rules read from one origin's robots.txt
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw file body; empty when the origin has no usable robots.txt
    content: String,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules for an origin without robots.txt
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `agent` may fetch `url`
    ///
    /// Query strings take part in matching, so a rule such as
    /// `Disallow: /food?store=` applies to catalog pages.
    pub fn is_allowed(&self, url: &Url, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        DefaultMatcher::default().one_agent_allowed_by_robots(&self.content, agent, url.as_str())
    }
}
