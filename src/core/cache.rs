use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::error::CacheError;

/// Seven days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(604_800);

/// Builds `<namespace>:video:duration:<key>` style keys so durations and
/// metadata for the same video never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn duration(&self, video_key: &str) -> String {
        format!("{}:video:duration:{}", self.namespace, video_key)
    }

    pub fn metadata(&self, video_key: &str) -> String {
        format!("{}:video:metadata:{}", self.namespace, video_key)
    }
}

/// Key/value store with TTL. Implementations must be safe to share
/// between concurrent resolutions.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_duration(&self, video_key: &str) -> Result<Option<u64>, CacheError>;

    async fn set_duration(
        &self,
        video_key: &str,
        seconds: u64,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn delete_duration(&self, video_key: &str) -> Result<(), CacheError>;

    async fn get_metadata(&self, video_key: &str)
        -> Result<Option<serde_json::Value>, CacheError>;

    async fn set_metadata(
        &self,
        video_key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Callers skip caching entirely when this is false.
    async fn is_healthy(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub ttl_seconds: u64,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(key: String, value: String, ttl: Duration) -> Self {
        Self {
            key,
            value,
            ttl_seconds: ttl.as_secs(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub duration_entries: usize,
    pub metadata_entries: usize,
    pub expired_entries: usize,
}

/// Process-local cache with the same contract as the shared store.
#[derive(Debug)]
pub struct MemoryCache {
    keys: CacheKeys,
    entries: DashMap<String, CacheEntry>,
    available: AtomicBool,
}

impl MemoryCache {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            keys: CacheKeys::new(namespace),
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability, mirroring a backing server going away.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> CacheStats {
        let marker_duration = ":video:duration:";
        let marker_metadata = ":video:metadata:";
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            if entry.is_expired() {
                stats.expired_entries += 1;
            } else if entry.key.contains(marker_duration) {
                stats.duration_entries += 1;
            } else if entry.key.contains(marker_metadata) {
                stats.metadata_entries += 1;
            }
        }
        stats
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory cache disabled".to_string()))
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn write(&self, key: String, value: String, ttl: Duration) {
        self.entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl));
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_duration(&self, video_key: &str) -> Result<Option<u64>, CacheError> {
        self.ensure_available()?;
        let key = self.keys.duration(video_key);
        match self.read(&key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(|secs| (secs > 0).then_some(secs))
                .map_err(|e| CacheError::Malformed {
                    key,
                    message: e.to_string(),
                }),
        }
    }

    async fn set_duration(
        &self,
        video_key: &str,
        seconds: u64,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.write(self.keys.duration(video_key), seconds.to_string(), ttl);
        Ok(())
    }

    async fn delete_duration(&self, video_key: &str) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.entries.remove(&self.keys.duration(video_key));
        Ok(())
    }

    async fn get_metadata(
        &self,
        video_key: &str,
    ) -> Result<Option<serde_json::Value>, CacheError> {
        self.ensure_available()?;
        let key = self.keys.metadata(video_key);
        match self.read(&key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::Malformed {
                    key,
                    message: e.to_string(),
                }),
        }
    }

    async fn set_metadata(
        &self,
        video_key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.write(self.keys.metadata(video_key), value.to_string(), ttl);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_keys() {
        let keys = CacheKeys::new("coomunity");
        assert_eq!(keys.duration("youtube:abc"), "coomunity:video:duration:youtube:abc");
        assert_eq!(keys.metadata("youtube:abc"), "coomunity:video:metadata:youtube:abc");
    }

    #[tokio::test]
    async fn test_duration_and_metadata_do_not_collide() {
        let cache = MemoryCache::new("test");
        cache.set_duration("k", 729, DEFAULT_TTL).await.unwrap();
        cache
            .set_metadata("k", &serde_json::json!({"title": "x"}), DEFAULT_TTL)
            .await
            .unwrap();

        assert_eq!(cache.get_duration("k").await.unwrap(), Some(729));
        assert_eq!(
            cache.get_metadata("k").await.unwrap(),
            Some(serde_json::json!({"title": "x"}))
        );

        cache.delete_duration("k").await.unwrap();
        assert_eq!(cache.get_duration("k").await.unwrap(), None);
        assert!(cache.get_metadata("k").await.unwrap().is_some());
        assert_eq!(
            cache.stats(),
            CacheStats {
                duration_entries: 0,
                metadata_entries: 1,
                expired_entries: 0
            }
        );
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = MemoryCache::new("test");
        cache.set_duration("k", 10, Duration::ZERO).await.unwrap();
        assert_eq!(cache.stats().expired_entries, 1);
        assert_eq!(cache.get_duration("k").await.unwrap(), None);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let cache = MemoryCache::new("test");
        cache.set_available(false);
        assert!(!cache.is_healthy().await);
        assert!(matches!(
            cache.get_duration("k").await,
            Err(CacheError::Unavailable(_))
        ));
    }
}
