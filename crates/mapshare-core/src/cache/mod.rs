//! Response caching for MapShare feeds.
//!
//! This module provides the `CacheStore` seam used by the feed fetcher,
//! plus two stores:
//! - `MemoryCache`: process-local map, shared between concurrent requests
//! - `FileCache`: one JSON file per key, survives restarts
//!
//! Entries carry their own expiry; expired entries behave as absent.

pub mod file;
pub mod memory;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use file::FileCache;
pub use memory::MemoryCache;

/// Prefix applied to every cache key
const CACHE_KEY_PREFIX: &str = "inmap_";

/// Key/value store with per-entry expiry in minutes.
pub trait CacheStore: Send + Sync {
    /// Return the value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key` for `ttl_minutes`, replacing any existing entry.
    fn set(&self, key: &str, value: &str, ttl_minutes: i64);
}

impl<T: CacheStore + ?Sized> CacheStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl_minutes: i64) {
        (**self).set(key, value, ttl_minutes)
    }
}

/// Derive the cache key for a fully assembled request URL.
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}{}", CACHE_KEY_PREFIX, hex::encode(digest))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, ttl_minutes: i64) -> Self {
        Self::new_at(data, ttl_minutes, Utc::now())
    }

    pub fn new_at(data: T, ttl_minutes: i64, now: DateTime<Utc>) -> Self {
        Self {
            data,
            cached_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else {
            format!("{}h ago", minutes / 60)
        }
    }
}
