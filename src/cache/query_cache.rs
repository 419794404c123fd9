//! TTL + LRU query-result cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::types::SearchResult;

/// Fingerprint of a retrieval query, used as the LRU cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    /// Bit pattern of the query embedding components, so the key can derive `Hash`/`Eq`.
    embedding_bits: Vec<u64>,
    concepts: Vec<String>,
    threshold_milli: i64,
    exclude_last_n: usize,
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.embedding_bits.hash(state);
        self.concepts.hash(state);
        self.threshold_milli.hash(state);
        self.exclude_last_n.hash(state);
    }
}

impl CacheKey {
    #[must_use]
    pub fn new(embedding: &[f64], concepts: &[String], threshold: f64, exclude_last_n: usize) -> Self {
        let mut concepts = concepts.to_vec();
        concepts.sort();
        #[allow(clippy::cast_possible_truncation)]
        let threshold_milli = (threshold * 1000.0).round() as i64;
        Self {
            embedding_bits: embedding.iter().map(|v| v.to_bits()).collect(),
            concepts,
            threshold_milli,
            exclude_last_n,
        }
    }

    fn hash_u64(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

struct CachedEntry {
    results: Vec<SearchResult>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Hit/miss/eviction counters for the query cache.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of retrieval results, keyed by query fingerprint, with per-entry TTL.
pub struct QueryCache {
    cache: RwLock<LruCache<u64, CachedEntry>>,
    metrics: RwLock<CacheMetrics>,
    default_ttl: Duration,
}

impl QueryCache {
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            metrics: RwLock::new(CacheMetrics::default()),
            default_ttl: ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        let hash = key.hash_u64();
        let mut cache = self.cache.write().expect("query cache lock poisoned");
        let mut metrics = self.metrics.write().expect("query cache metrics lock poisoned");
        match cache.get(&hash) {
            Some(entry) if !entry.is_expired() => {
                metrics.hits += 1;
                Some(entry.results.clone())
            }
            Some(_) => {
                cache.pop(&hash);
                metrics.misses += 1;
                metrics.evictions += 1;
                None
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, key: &CacheKey, results: Vec<SearchResult>) {
        let hash = key.hash_u64();
        let mut cache = self.cache.write().expect("query cache lock poisoned");
        cache.put(
            hash,
            CachedEntry {
                results,
                cached_at: Instant::now(),
                ttl: self.default_ttl,
            },
        );
    }

    /// Drop every cached entry; called whenever the short-term list mutates.
    pub fn invalidate_all(&self) {
        let mut cache = self.cache.write().expect("query cache lock poisoned");
        cache.clear();
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.read().expect("query cache metrics lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interaction;

    fn sample_result() -> SearchResult {
        let interaction = Interaction::new("p".into(), "o".into(), vec![1.0, 0.0], 0);
        SearchResult::new(interaction, 1.0, 0.0, 0.0, 0.9)
    }

    #[test]
    fn miss_then_hit() {
        let cache = QueryCache::new(10, Duration::from_mins(1));
        let key = CacheKey::new(&[1.0, 0.0], &["a".to_string()], 0.5, 0);
        assert!(cache.get(&key).is_none());
        cache.put(&key, vec![sample_result()]);
        assert_eq!(cache.get(&key).unwrap().len(), 1);
        assert_eq!(cache.metrics().hits, 1);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = QueryCache::new(10, Duration::from_millis(5));
        let key = CacheKey::new(&[1.0], &[], 0.5, 0);
        cache.put(&key, vec![sample_result()]);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn invalidate_all_clears_entries() {
        let cache = QueryCache::new(10, Duration::from_mins(1));
        let key = CacheKey::new(&[1.0], &[], 0.5, 0);
        cache.put(&key, vec![sample_result()]);
        cache.invalidate_all();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let cache = QueryCache::new(10, Duration::from_mins(1));
        let key_a = CacheKey::new(&[1.0, 0.0], &["a".to_string()], 0.5, 0);
        let key_b = CacheKey::new(&[0.0, 1.0], &["b".to_string()], 0.5, 0);
        cache.put(&key_a, vec![sample_result()]);
        assert!(cache.get(&key_b).is_none());
    }
}
