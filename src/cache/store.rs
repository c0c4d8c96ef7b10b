//! Response cache storage.
//!
//! Holds serialized response payloads keyed by endpoint prefix plus request
//! fingerprint, each stamped with a fixed TTL. Writes invalidate by prefix,
//! best effort; the TTL bounds any staleness the invalidation race lets
//! through. Reads that affect state (view counting, toggles) must never go
//! through here.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use serde_json::Value;

use super::config::CacheConfig;
use super::keys::{CacheKey, CachePrefix};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Clone)]
struct CachedEntry {
    payload: Value,
    expires_at: Instant,
}

pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<LruCache<CacheKey, CachedEntry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        let limit = config.response_limit_non_zero();
        Self {
            config,
            entries: RwLock::new(LruCache::new(limit)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached payload, dropping it if the TTL has lapsed.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    counter!("immob_cache_hit_total").increment(1);
                    return Some(entry.payload.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        counter!("immob_cache_miss_total").increment(1);
        None
    }

    pub fn set(&self, key: CacheKey, payload: Value, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = CachedEntry {
            payload,
            expires_at: Instant::now() + ttl,
        };
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key, entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!("immob_cache_evict_total").increment(1);
        }
    }

    pub fn delete(&self, key: &CacheKey) {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
    }

    /// Drop every entry sharing the given prefix.
    pub fn delete_by_prefix(&self, prefix: CachePrefix) {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_by_prefix");
        let matching: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.prefix == prefix)
            .map(|(key, _)| *key)
            .collect();
        for key in &matching {
            entries.pop(key);
        }
        if !matching.is_empty() {
            counter!("immob_cache_invalidate_total").increment(matching.len() as u64);
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn cache() -> ResponseCache {
        ResponseCache::new(CacheConfig::default())
    }

    fn minute() -> Duration {
        Duration::from_secs(60)
    }

    #[test]
    fn get_set_round_trip() {
        let cache = cache();
        let key = CacheKey::bare(CachePrefix::PropertyStats);

        assert!(cache.get(&key).is_none());

        cache.set(key, json!({"total_properties": 3}), minute());

        let hit = cache.get(&key).expect("cached payload");
        assert_eq!(hit["total_properties"], 3);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = cache();
        let key = CacheKey::bare(CachePrefix::PropertyFeatured);

        cache.set(key, json!([]), Duration::ZERO);

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn prefix_invalidation_spares_other_prefixes() {
        let cache = cache();
        let list_a = CacheKey::for_params(
            CachePrefix::PropertyList,
            &[("status".to_string(), "for_sale".to_string())],
        );
        let list_b = CacheKey::for_params(
            CachePrefix::PropertyList,
            &[("status".to_string(), "for_rent".to_string())],
        );
        let stats = CacheKey::bare(CachePrefix::PropertyStats);

        cache.set(list_a, json!({"items": []}), minute());
        cache.set(list_b, json!({"items": []}), minute());
        cache.set(stats, json!({"total_properties": 0}), minute());

        cache.delete_by_prefix(CachePrefix::PropertyList);

        assert!(cache.get(&list_a).is_none());
        assert!(cache.get(&list_b).is_none());
        assert!(cache.get(&stats).is_some());
    }

    #[test]
    fn lru_eviction_respects_limit() {
        let cache = ResponseCache::new(CacheConfig {
            response_limit: 2,
            ..Default::default()
        });

        let keys: Vec<CacheKey> = (0..3)
            .map(|n| {
                CacheKey::for_params(
                    CachePrefix::ReviewList,
                    &[("page".to_string(), n.to_string())],
                )
            })
            .collect();

        for key in &keys {
            cache.set(*key, json!(null), minute());
        }

        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[1]).is_some());
        assert!(cache.get(&keys[2]).is_some());
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache = ResponseCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let key = CacheKey::bare(CachePrefix::PropertyStats);

        cache.set(key, json!(1), minute());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = cache();
        let key = CacheKey::bare(CachePrefix::PropertyStats);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("lock acquired");
            panic!("poison entries lock");
        }));

        cache.set(key, json!(1), minute());
        assert!(cache.get(&key).is_some());
    }
}
