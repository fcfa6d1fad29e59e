//! MapShare feed retrieval.
//!
//! This module splits fetching into two layers:
//! - `FeedSource`: the network call itself (`HttpFeedSource` in production)
//! - `CachedFetcher`: cache lookup, KML validation and cache write around it
//!
//! The feed endpoint takes the MapShare identifier as a path segment and
//! optional `d1`/`d2` date filters, and answers `POST` with a KML body.

pub mod error;
pub mod fetcher;
pub mod request;
pub mod source;

pub use error::FeedError;
pub use fetcher::{CachedFetcher, FetchedFeed, CACHE_TTL_MINUTES};
pub use request::{FeedUrl, FetchRequest};
pub use source::{FeedSource, HttpFeedSource};
