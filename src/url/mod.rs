//! URL handling module for Menu-Atlas
//!
//! Normalization, link resolution, and the stable keys derived from page URLs
//! that name checkpoints.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Resolves an href found on `base` into an absolute, normalized URL
///
/// Returns `None` for anchors, scripts, mail links and anything that is not
/// http(s).
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let joined = base.join(href).ok()?;
    normalize_url(joined.as_str()).ok()
}

/// Stable key for a directory page: its path without the leading slash and
/// the `.html` suffix
///
/// `https://locations.example.com/ak/anchorage.html` becomes `ak/anchorage`.
/// The root page maps to `root`.
pub fn page_key(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    let path = path.strip_suffix(".html").unwrap_or(path);
    if path.is_empty() {
        "root".to_string()
    } else {
        path.to_lowercase()
    }
}

/// Scheme, host and port of a URL, used to scope politeness and robots rules
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// First value of a query parameter
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Returns `url` with `name=value` set, replacing any previous value
pub fn with_query_param(url: &Url, name: &str, value: &str) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = url.clone();
    out.set_query(None);
    {
        let mut pairs = out.query_pairs_mut();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(name, value);
    }
    out
}
