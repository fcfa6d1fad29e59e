use std::fmt;

use url::form_urlencoded;

use crate::cache::cache_key;

/// One MapShare feed request as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub identifier: String,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub password: Option<String>,
}

/// Treat blank strings the same as absent values
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FetchRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_dates(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.date_start = present(start);
        self.date_end = present(end);
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = present(password);
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        Some(self.identifier.trim()).filter(|id| !id.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// Fully assembled feed URL, query included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedUrl(String);

impl FeedUrl {
    /// Build `<endpoint>/<identifier>[?d1=..&d2=..]`.
    /// Returns `None` when the request has no identifier.
    pub fn build(endpoint: &str, request: &FetchRequest) -> Option<Self> {
        let identifier = request.identifier()?;

        let mut url = endpoint.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(identifier);

        let start = request.date_start.as_deref().filter(|d| !d.is_empty());
        let end = request.date_end.as_deref().filter(|d| !d.is_empty());
        if start.is_some() || end.is_some() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            if let Some(start) = start {
                query.append_pair("d1", start);
            }
            if let Some(end) = end {
                query.append_pair("d2", end);
            }
            url.push('?');
            url.push_str(&query.finish());
        }

        Some(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache identity; credentials are deliberately not part of it.
    pub fn cache_key(&self) -> String {
        cache_key(&self.0)
    }
}

impl fmt::Display for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://explore.garmin.com/feed/share/";

    #[test]
    fn test_no_identifier_builds_nothing() {
        assert!(FeedUrl::build(ENDPOINT, &FetchRequest::new("")).is_none());
        assert!(FeedUrl::build(ENDPOINT, &FetchRequest::new("   ")).is_none());
    }

    #[test]
    fn test_identifier_only() {
        let url = FeedUrl::build(ENDPOINT, &FetchRequest::new("TrailParty")).expect("url");
        assert_eq!(url.as_str(), "https://explore.garmin.com/feed/share/TrailParty");
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let url = FeedUrl::build("https://example.com/feed", &FetchRequest::new("abc")).expect("url");
        assert_eq!(url.as_str(), "https://example.com/feed/abc");
    }

    #[test]
    fn test_date_params_order_and_encoding() {
        let request = FetchRequest::new("abc").with_dates(
            Some("2020-10-02T16:20".to_string()),
            Some("2020-10-03".to_string()),
        );
        let url = FeedUrl::build(ENDPOINT, &request).expect("url");
        assert_eq!(
            url.as_str(),
            "https://explore.garmin.com/feed/share/abc?d1=2020-10-02T16%3A20&d2=2020-10-03"
        );

        let end_only = FetchRequest::new("abc").with_dates(None, Some("2020-10-03".to_string()));
        let url = FeedUrl::build(ENDPOINT, &end_only).expect("url");
        assert_eq!(url.as_str(), "https://explore.garmin.com/feed/share/abc?d2=2020-10-03");
    }

    #[test]
    fn test_blank_dates_are_absent() {
        let request = FetchRequest::new("abc").with_dates(Some("".to_string()), Some(" ".to_string()));
        assert!(request.date_start.is_none());
        assert!(request.date_end.is_none());
        let url = FeedUrl::build(ENDPOINT, &request).expect("url");
        assert!(!url.as_str().contains('?'));
    }

    #[test]
    fn test_cache_key_ignores_password() {
        let plain = FetchRequest::new("abc");
        let authed = FetchRequest::new("abc").with_password(Some("secret".to_string()));
        let a = FeedUrl::build(ENDPOINT, &plain).expect("url");
        let b = FeedUrl::build(ENDPOINT, &authed).expect("url");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_tracks_identifier_and_dates() {
        let base = FeedUrl::build(ENDPOINT, &FetchRequest::new("abc")).expect("url");
        let other = FeedUrl::build(ENDPOINT, &FetchRequest::new("abd")).expect("url");
        let dated = FeedUrl::build(
            ENDPOINT,
            &FetchRequest::new("abc").with_dates(Some("2020-10-02".to_string()), None),
        )
        .expect("url");
        let same = FeedUrl::build(ENDPOINT, &FetchRequest::new("abc")).expect("url");

        assert_eq!(base.cache_key(), same.cache_key());
        assert_ne!(base.cache_key(), other.cache_key());
        assert_ne!(base.cache_key(), dated.cache_key());
    }
}
