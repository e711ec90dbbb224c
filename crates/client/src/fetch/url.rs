//! Archive URL construction.

use url::Url;

/// Error type for base URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse the configured archive base URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Remove query and fragment
pub fn parse_base_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Build `<base>/search?q=<query>` with the query form-encoded.
pub fn search_url(base: &Url, query: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/search", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("q", query);
    url
}

/// Resolve a result link against the base URL. Absolute links are kept.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        parse_base_url("https://example.com").unwrap()
    }

    #[test]
    fn test_parse_base_url_default_scheme() {
        let url = parse_base_url("annas-archive.org").unwrap();
        assert_eq!(url.as_str(), "https://annas-archive.org/");
    }

    #[test]
    fn test_parse_base_url_strips_query_and_fragment() {
        let url = parse_base_url("  https://example.com/?x=1#top ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_parse_base_url_errors() {
        assert!(matches!(parse_base_url(""), Err(UrlError::Empty)));
        assert!(matches!(parse_base_url("   "), Err(UrlError::Empty)));
        assert!(matches!(parse_base_url("ftp://example.com"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_search_url_encoding() {
        let url = search_url(&base(), "test & query");
        assert_eq!(url.as_str(), "https://example.com/search?q=test+%26+query");
    }

    #[test]
    fn test_search_url_plus_sign() {
        let url = search_url(&base(), "test+query");
        assert_eq!(url.as_str(), "https://example.com/search?q=test%2Bquery");
    }

    #[test]
    fn test_search_url_with_base_path() {
        let base = parse_base_url("https://mirror.example.org/archive/").unwrap();
        let url = search_url(&base, "ruby");
        assert_eq!(url.as_str(), "https://mirror.example.org/archive/search?q=ruby");
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(resolve_link(&base(), "/md5/abc").as_deref(), Some("https://example.com/md5/abc"));
        assert_eq!(resolve_link(&base(), "https://other.org/x").as_deref(), Some("https://other.org/x"));
        assert_eq!(resolve_link(&base(), "  "), None);
    }
}
