//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_RESPONSE_LIMIT: usize = 500;
const DEFAULT_PROPERTY_LIST_TTL_SECS: u64 = 5 * 60;
const DEFAULT_PROPERTY_DETAIL_TTL_SECS: u64 = 10 * 60;
const DEFAULT_FEATURED_TTL_SECS: u64 = 10 * 60;
const DEFAULT_STATS_TTL_SECS: u64 = 30 * 60;
const DEFAULT_REVIEW_LIST_TTL_SECS: u64 = 10 * 60;
const DEFAULT_REVIEW_STATS_TTL_SECS: u64 = 10 * 60;

/// Response-cache tuning knobs resolved from deployment settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache. Disabling makes every read hit the store.
    pub enabled: bool,
    /// Maximum cached responses before LRU eviction.
    pub response_limit: usize,
    pub property_list_ttl_secs: u64,
    pub property_detail_ttl_secs: u64,
    pub featured_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    pub review_list_ttl_secs: u64,
    pub review_stats_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_limit: DEFAULT_RESPONSE_LIMIT,
            property_list_ttl_secs: DEFAULT_PROPERTY_LIST_TTL_SECS,
            property_detail_ttl_secs: DEFAULT_PROPERTY_DETAIL_TTL_SECS,
            featured_ttl_secs: DEFAULT_FEATURED_TTL_SECS,
            stats_ttl_secs: DEFAULT_STATS_TTL_SECS,
            review_list_ttl_secs: DEFAULT_REVIEW_LIST_TTL_SECS,
            review_stats_ttl_secs: DEFAULT_REVIEW_STATS_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.response_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn property_list_ttl(&self) -> Duration {
        Duration::from_secs(self.property_list_ttl_secs)
    }

    pub fn property_detail_ttl(&self) -> Duration {
        Duration::from_secs(self.property_detail_ttl_secs)
    }

    pub fn featured_ttl(&self) -> Duration {
        Duration::from_secs(self.featured_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn review_list_ttl(&self) -> Duration {
        Duration::from_secs(self.review_list_ttl_secs)
    }

    pub fn review_stats_ttl(&self) -> Duration {
        Duration::from_secs(self.review_stats_ttl_secs)
    }
}
