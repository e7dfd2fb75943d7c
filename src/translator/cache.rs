//! 会话级翻译缓存
//!
//! 键是请求内容（后端、模型、语言、文本）的哈希。条目超过存活时间即失效，
//! 超过容量时淘汰最早写入的条目。缓存只是优化，命中与否不影响结果的正确性。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::api_constants::service_config;

struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

pub struct TranslationCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TranslationCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: u64) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let found = match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        };

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: u64, value: String) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let ttl = self.ttl;
        entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| *k)
            {
                debug!("翻译缓存已满，淘汰最早的条目");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(service_config::DEFAULT_CACHE_TTL_SECONDS),
            service_config::DEFAULT_CACHE_CAPACITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = TranslationCache::default();
        assert!(cache.get(1).is_none());
        cache.insert(1, "hello".to_string());
        assert_eq!(cache.get(1).unwrap(), "hello");
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = TranslationCache::new(Duration::ZERO, 10);
        cache.insert(1, "hello".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = TranslationCache::new(Duration::from_secs(60), 2);
        cache.insert(1, "a".to_string());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(2, "b".to_string());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(3, "c".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(3).unwrap(), "c");
    }
}
