//! In-memory TTL cache for token USD prices

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    price: f64,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Thread-safe price cache keyed by lowercase token address.
///
/// Expired entries are kept so a failed refresh can still fall back to the
/// last known price.
pub struct PriceCache {
    prices: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl PriceCache {
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, 500)
    }

    /// Fresh price, if one was cached within the TTL
    pub fn get(&self, token: &str) -> Option<f64> {
        let cache = self.prices.read().ok()?;
        let entry = cache.get(&token.to_lowercase())?;

        if entry.is_expired(self.ttl) {
            None
        } else {
            Some(entry.price)
        }
    }

    /// Last cached price regardless of age
    pub fn get_stale(&self, token: &str) -> Option<f64> {
        let cache = self.prices.read().ok()?;
        cache.get(&token.to_lowercase()).map(|e| e.price)
    }

    /// Insert or refresh a price, evicting the oldest entry at capacity
    pub fn insert(&self, token: &str, price: f64) {
        if let Ok(mut cache) = self.prices.write() {
            let key = token.to_lowercase();
            if cache.len() >= self.max_entries && !cache.contains_key(&key) {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                }
            }

            cache.insert(
                key,
                CacheEntry {
                    price,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, token: &str) {
        if let Ok(mut cache) = self.prices.write() {
            cache.remove(&token.to_lowercase());
        }
    }

    pub fn len(&self) -> usize {
        self.prices.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::with_capacity(Duration::from_secs(30), 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_case_insensitive() {
        let cache = PriceCache::default();
        cache.insert("0xAbC", 1.25);
        assert_eq!(cache.get("0xabc"), Some(1.25));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_stale_only() {
        let cache = PriceCache::new(Duration::from_millis(0));
        cache.insert("0xabc", 2.0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("0xabc"), None);
        assert_eq!(cache.get_stale("0xabc"), Some(2.0));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = PriceCache::with_capacity(Duration::from_secs(30), 2);
        cache.insert("a", 1.0);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", 2.0);
        cache.insert("c", 3.0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3.0));
    }
}
