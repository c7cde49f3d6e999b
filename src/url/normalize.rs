use crate::UrlError;
use url::Url;

/// Normalizes a URL so the same page always yields the same string
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the host
/// 4. Remove dot segments and a trailing slash (except for root `/`)
/// 5. Remove the fragment
/// 6. Drop an empty query string
///
/// Query parameters are kept in order; catalog pages are addressed by them.
///
/// # Examples
///
/// ```
/// use menu_atlas::url::normalize_url;
///
/// let url = normalize_url("https://Locations.Example.com/ak/#map").unwrap();
/// assert_eq!(url.as_str(), "https://locations.example.com/ak");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases domain hosts; IPs are left as is.
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if matches!(url.query(), Some("")) {
        url.set_query(None);
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
