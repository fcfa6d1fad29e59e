//! Fetch, parse and convert a MapShare feed in one call.
//!
//! `FeedService` never fails: every transport or feed problem is logged and
//! degrades to an empty `FeatureCollection`, so callers can always render.

use std::time::Duration;

use tracing::warn;

use crate::cache::CacheStore;
use crate::config::FeedConfig;
use crate::feed::{CachedFetcher, FeedError, FeedSource, FetchRequest, FetchedFeed, HttpFeedSource};
use crate::geojson::{self, FeatureCollection};

/// Serialized form of an empty collection, used if serialization ever fails
const EMPTY_COLLECTION_JSON: &str = r#"{"type":"FeatureCollection","features":[]}"#;

pub struct FeedService<S, C> {
    fetcher: CachedFetcher<S, C>,
    config: FeedConfig,
}

impl<C: CacheStore> FeedService<HttpFeedSource, C> {
    /// Service backed by the real feed endpoint.
    pub fn http(config: FeedConfig, cache: C) -> Result<Self, FeedError> {
        let source =
            HttpFeedSource::with_timeout(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(source, cache, config))
    }
}

impl<S: FeedSource, C: CacheStore> FeedService<S, C> {
    pub fn new(source: S, cache: C, config: FeedConfig) -> Self {
        let fetcher = CachedFetcher::new(source, cache, config.endpoint.clone());
        Self { fetcher, config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        self.fetcher.cache()
    }

    /// The feed as GeoJSON, using the cache when it holds a live entry.
    pub async fn feature_collection(&self, request: &FetchRequest) -> FeatureCollection {
        let fetched = self.fetcher.fetch(request).await;
        self.convert(request, fetched)
    }

    /// Same as `feature_collection`, but skips the cache lookup.
    pub async fn refresh(&self, request: &FetchRequest) -> FeatureCollection {
        let fetched = self.fetcher.fetch_fresh(request).await;
        self.convert(request, fetched)
    }

    /// Serialized GeoJSON for embedding in a page or an endpoint response.
    pub async fn geojson(&self, request: &FetchRequest) -> String {
        let collection = self.feature_collection(request).await;
        collection.to_json().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize feature collection");
            EMPTY_COLLECTION_JSON.to_string()
        })
    }

    fn convert(
        &self,
        request: &FetchRequest,
        fetched: Result<Option<FetchedFeed>, FeedError>,
    ) -> FeatureCollection {
        match fetched {
            Ok(Some(feed)) => geojson::build(&feed.document, &self.config),
            Ok(None) => FeatureCollection::empty(),
            Err(e) => {
                warn!(identifier = %request.identifier, error = %e, "Feed fetch failed");
                FeatureCollection::empty()
            }
        }
    }
}
