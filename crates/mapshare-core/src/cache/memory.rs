use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CacheStore, CachedData};

/// In-process cache shared between concurrent feed requests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedData<String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedData<String>>> {
        // Entries are replaced whole under the lock; a poisoned map is still usable
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            Some(cached) if !cached.is_expired_at(now) => return Some(cached.data.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(key = key, "Evicting expired cache entry");
            entries.remove(key);
        }
        None
    }

    /// Store an entry, sweeping out any that have expired by `now`.
    pub fn set_at(&self, key: &str, value: &str, ttl_minutes: i64, now: DateTime<Utc>) {
        let mut entries = self.entries();
        let purged = Self::sweep(&mut entries, now);
        if purged > 0 {
            debug!(purged = purged, "Swept expired cache entries");
        }
        let cached = CachedData::new_at(value.to_string(), ttl_minutes, now);
        entries.insert(key.to_string(), cached);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        Self::sweep(&mut self.entries(), Utc::now())
    }

    fn sweep(entries: &mut HashMap<String, CachedData<String>>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|_, cached| !cached.is_expired_at(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    fn set(&self, key: &str, value: &str, ttl_minutes: i64) {
        self.set_at(key, value, ttl_minutes, Utc::now())
    }
}
