use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{CacheStore, CachedData};

/// Distinguishes temp files written by concurrent writers in one process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Disk-backed cache: one JSON envelope per key.
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    fn load(&self, key: &str) -> Result<Option<CachedData<String>>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", key))?;

        let cached: CachedData<String> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", key))?;

        Ok(Some(cached))
    }

    fn save(&self, key: &str, cached: &CachedData<String>) -> Result<()> {
        let path = self.cache_path(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .cache_dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq));

        let contents = serde_json::to_string(cached)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", key))?;
        // Rename is atomic on the same filesystem; last writer wins
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to move cache file into place: {}", key));
        }
        Ok(())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        match self.load(key) {
            Ok(Some(cached)) if !cached.is_expired_at(now) => {
                debug!(key = key, age = %cached.age_display(), "File cache hit");
                Some(cached.data)
            }
            Ok(Some(_)) => {
                debug!(key = key, "File cache entry expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to load cache entry, treating as miss");
                None
            }
        }
    }

    pub fn set_at(&self, key: &str, value: &str, ttl_minutes: i64, now: DateTime<Utc>) {
        let cached = CachedData::new_at(value.to_string(), ttl_minutes, now);
        if let Err(e) = self.save(key, &cached) {
            warn!(key = key, error = %e, "Failed to write cache entry");
        }
    }

    /// Remove every cache entry, returning how many files were deleted
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    fn set(&self, key: &str, value: &str, ttl_minutes: i64) {
        self.set_at(key, value, ttl_minutes, Utc::now())
    }
}
