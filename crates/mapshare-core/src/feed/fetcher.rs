use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::kml::{self, KmlDocument};

use super::{FeedError, FeedSource, FeedUrl, FetchRequest};

/// How long a validated feed body stays in the cache.
pub const CACHE_TTL_MINUTES: i64 = 15;

/// A feed body that parsed as KML, together with its parsed document.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub raw: String,
    pub document: KmlDocument,
}

/// Caching decorator around a `FeedSource`.
///
/// Only bodies that parse as KML are written to the cache, so transport
/// errors and error pages never poison it.
pub struct CachedFetcher<S, C> {
    source: S,
    cache: C,
    endpoint: String,
}

impl<S: FeedSource, C: CacheStore> CachedFetcher<S, C> {
    pub fn new(source: S, cache: C, endpoint: impl Into<String>) -> Self {
        Self {
            source,
            cache,
            endpoint: endpoint.into(),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Return the feed for a request, from cache when live.
    ///
    /// `Ok(None)` means the request had no identifier and nothing was attempted.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Option<FetchedFeed>, FeedError> {
        let Some(url) = FeedUrl::build(&self.endpoint, request) else {
            debug!("No MapShare identifier, skipping fetch");
            return Ok(None);
        };

        let key = url.cache_key();
        if let Some(raw) = self.cache.get(&key) {
            debug!(url = %url, key = %key, "Feed served from cache");
            let document = kml::parse(&raw).inspect_err(|e| {
                warn!(key = %key, error = %e, "Cached feed is not valid KML");
            })?;
            return Ok(Some(FetchedFeed { raw, document }));
        }

        self.fetch_and_store(&url, &key, request.password()).await.map(Some)
    }

    /// Like `fetch`, but always goes to the network. A valid body still
    /// replaces the cached entry.
    pub async fn fetch_fresh(
        &self,
        request: &FetchRequest,
    ) -> Result<Option<FetchedFeed>, FeedError> {
        let Some(url) = FeedUrl::build(&self.endpoint, request) else {
            debug!("No MapShare identifier, skipping fetch");
            return Ok(None);
        };
        let key = url.cache_key();
        self.fetch_and_store(&url, &key, request.password()).await.map(Some)
    }

    async fn fetch_and_store(
        &self,
        url: &FeedUrl,
        key: &str,
        password: Option<&str>,
    ) -> Result<FetchedFeed, FeedError> {
        let raw = self.source.fetch(url, password).await?;

        let document = kml::parse(&raw)?;

        self.cache.set(key, &raw, CACHE_TTL_MINUTES);
        info!(url = %url, bytes = raw.len(), "Fetched and cached feed");
        Ok(FetchedFeed { raw, document })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const ENDPOINT: &str = "https://explore.garmin.com/feed/share/";

    /// Scripted feed source recording every call.
    #[derive(Clone, Default)]
    pub(crate) struct FakeSource {
        pub body: Option<String>,
        pub calls: Arc<AtomicUsize>,
        pub seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
    }

    impl FakeSource {
        pub(crate) fn returning(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                ..Self::default()
            }
        }

        /// A source whose every request fails at the transport level
        pub(crate) fn failing() -> Self {
            Self::default()
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeedSource for FakeSource {
        async fn fetch(&self, url: &FeedUrl, password: Option<&str>) -> Result<String, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .expect("seen lock")
                .push((url.to_string(), password.map(str::to_string)));
            match &self.body {
                Some(body) => Ok(body.clone()),
                None => Err(FeedError::ServerError("503 Service Unavailable".to_string())),
            }
        }
    }

    const VALID_KML: &str = "<kml><Document><Folder></Folder></Document></kml>";

    #[tokio::test]
    async fn test_missing_identifier_is_noop() {
        let source = FakeSource::returning(VALID_KML);
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);

        let result = fetcher.fetch(&FetchRequest::new("")).await.expect("no error");
        assert!(result.is_none());
        assert_eq!(source.calls(), 0);
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let source = FakeSource::returning(VALID_KML);
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);
        let request = FetchRequest::new("TrailParty");

        let first = fetcher.fetch(&request).await.expect("first fetch").expect("feed");
        let second = fetcher.fetch(&request).await.expect("second fetch").expect("feed");

        assert_eq!(first.raw, VALID_KML);
        assert_eq!(second.raw, VALID_KML);
        assert!(second.document.document.is_some());
        assert_eq!(source.calls(), 1);
        assert_eq!(fetcher.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_body_is_not_cached() {
        let source = FakeSource::returning("<html><body>oops");
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);
        let request = FetchRequest::new("TrailParty");

        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(FeedError::MalformedFeed(_))));
        assert!(fetcher.cache().is_empty());

        // Nothing cached, so the next call goes back to the network
        let _ = fetcher.fetch(&request).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_body_is_not_cached() {
        let source = FakeSource::returning("");
        let fetcher = CachedFetcher::new(source, MemoryCache::new(), ENDPOINT);

        let result = fetcher.fetch(&FetchRequest::new("TrailParty")).await;
        assert!(matches!(result, Err(FeedError::MalformedFeed(kml::KmlError::Empty))));
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_cached() {
        let source = FakeSource::failing();
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);

        let result = fetcher.fetch(&FetchRequest::new("TrailParty")).await;
        assert!(matches!(result, Err(FeedError::ServerError(_))));
        assert!(fetcher.cache().is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_password_is_forwarded_but_not_keyed() {
        let source = FakeSource::returning(VALID_KML);
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);

        let authed = FetchRequest::new("TrailParty").with_password(Some("hunter2".to_string()));
        fetcher.fetch(&authed).await.expect("authed fetch");
        // Same URL without a password hits the entry cached above
        fetcher.fetch(&FetchRequest::new("TrailParty")).await.expect("plain fetch");

        assert_eq!(source.calls(), 1);
        let seen = source.seen.lock().expect("seen lock");
        assert_eq!(seen[0].0, "https://explore.garmin.com/feed/share/TrailParty");
        assert_eq!(seen[0].1.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_malformed() {
        let source = FakeSource::returning(VALID_KML);
        let fetcher = CachedFetcher::new(source.clone(), MemoryCache::new(), ENDPOINT);
        let request = FetchRequest::new("TrailParty");
        let key = FeedUrl::build(ENDPOINT, &request).expect("url").cache_key();
        fetcher.cache().set(&key, "<kml>", CACHE_TTL_MINUTES);

        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(FeedError::MalformedFeed(_))));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_fresh_bypasses_cache() {
        let source = FakeSource::returning(VALID_KML);
        let cache = Arc::new(MemoryCache::new());
        let fetcher = CachedFetcher::new(source.clone(), Arc::clone(&cache), ENDPOINT);
        let request = FetchRequest::new("TrailParty");

        fetcher.fetch(&request).await.expect("fetch");
        fetcher.fetch_fresh(&request).await.expect("fresh fetch");

        assert_eq!(source.calls(), 2);
        assert_eq!(cache.len(), 1);
    }
}
