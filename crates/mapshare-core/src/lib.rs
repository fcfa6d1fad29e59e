//! inReach MapShare core library.
//!
//! Fetches a Garmin MapShare KML feed, caches the raw response for a short
//! window and converts it into a GeoJSON `FeatureCollection` for a map
//! renderer.
//!
//! - `feed`: request building, HTTP source and the caching fetcher
//! - `cache`: `CacheStore` trait with memory and file-backed stores
//! - `kml`: typed KML document and parser
//! - `geojson`: KML to GeoJSON conversion and styling rules
//! - `service`: `FeedService`, the fetch/parse/build pipeline
//! - `config`: feed settings and the on-disk config file
//! - `credentials`: keychain storage for MapShare passwords

pub mod cache;
pub mod config;
pub mod credentials;
pub mod feed;
pub mod geojson;
pub mod kml;
pub mod service;

pub use cache::{CacheStore, FileCache, MemoryCache};
pub use config::{Config, FeedConfig};
pub use feed::{FeedError, FetchRequest};
pub use geojson::FeatureCollection;
pub use service::FeedService;
