//! Content cache — bounded key/value store with TTL.
//!
//! ## FIFO eviction
//!
//! When the store exceeds `capacity`, the entry inserted earliest is evicted
//! first. Insertion order is fixed when an entry is created; `get` never
//! updates it, so repeated access does not protect a hot key. This is an
//! intentional FIFO policy, not LRU.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A cached piece of content.
struct CacheEntry {
    content: String,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// In-memory content cache with TTL and FIFO eviction.
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order. May contain keys already overwritten or
    /// removed; eviction skips those.
    order: VecDeque<String>,
    ttl: Duration,
    capacity: usize,
}

impl CacheStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Look up content by key.
    ///
    /// Returns `None` when the key is absent or the entry is past its TTL.
    /// Expired entries are logically gone but physically removed lazily, by
    /// [`CacheStore::cleanup_expired`] or by eviction.
    pub fn get(&self, key: &str) -> Option<&str> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(&entry.content)
    }

    /// Insert content under a key, overwriting any existing entry.
    ///
    /// Overwriting re-creates the entry, so it takes a fresh insertion
    /// position for FIFO purposes. An eviction check follows: if the entry
    /// count exceeds capacity, the single oldest-inserted entry is removed.
    pub fn put(&mut self, key: &str, content: String) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                content,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        self.order.push_back(key.to_string());
        self.evict_if_over_capacity();
    }

    fn evict_if_over_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    if self.entries.remove(&oldest).is_some() {
                        tracing::info!("cache evicted oldest entry: {oldest}");
                    }
                }
                None => break,
            }
        }
    }

    /// Physically remove all expired entries.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
        }
        expired.len()
    }

    /// Number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Normalize a query into a cache key: trimmed and case-folded.
pub fn normalize_key(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let mut cache = CacheStore::new(Duration::from_secs(3600), 10);
        cache.put("fog", "thick coastal fog".to_string());
        assert_eq!(cache.get("fog"), Some("thick coastal fog"));
        assert_eq!(cache.get("rain"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let mut cache = CacheStore::new(Duration::from_secs(0), 10);
        cache.put("fog", "gone".to_string());
        // Zero TTL: logically expired immediately
        assert_eq!(cache.get("fog"), None);
        // But still physically present until swept
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_fifo_eviction_order() {
        let mut cache = CacheStore::new(Duration::from_secs(3600), 3);
        cache.put("k1", "a".to_string());
        cache.put("k2", "b".to_string());
        cache.put("k3", "c".to_string());

        // Access k1 repeatedly — FIFO ignores recency, so this must not
        // protect it.
        let _ = cache.get("k1");
        let _ = cache.get("k1");

        cache.put("k4", "d".to_string());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k2"), Some("b"));
        assert_eq!(cache.get("k3"), Some("c"));
        assert_eq!(cache.get("k4"), Some("d"));
    }

    #[test]
    fn test_overwrite_refreshes_insertion_position() {
        let mut cache = CacheStore::new(Duration::from_secs(3600), 2);
        cache.put("k1", "a".to_string());
        cache.put("k2", "b".to_string());
        // Rewriting k1 makes it the newest insertion
        cache.put("k1", "a2".to_string());
        cache.put("k3", "c".to_string());
        // k2 was then the oldest
        assert_eq!(cache.get("k2"), None);
        assert_eq!(cache.get("k1"), Some("a2"));
        assert_eq!(cache.get("k3"), Some("c"));
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Foggy Coast  "), "foggy coast");
        assert_eq!(normalize_key("LIGHTHOUSE"), "lighthouse");
    }
}
