//! Cache key definitions.
//!
//! Every cached response is addressed by a prefix naming the endpoint family
//! plus a fingerprint of the request parameters. Invalidation deletes by
//! prefix, so a write to an entity clears every parameter variant of its
//! list at once.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Endpoint families sharing an invalidation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePrefix {
    PropertyList,
    PropertyDetail,
    PropertyFeatured,
    PropertyStats,
    ReviewList,
    ReviewStats,
}

impl CachePrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            CachePrefix::PropertyList => "property_list",
            CachePrefix::PropertyDetail => "property_detail",
            CachePrefix::PropertyFeatured => "property_featured",
            CachePrefix::PropertyStats => "property_stats",
            CachePrefix::ReviewList => "review_list",
            CachePrefix::ReviewStats => "review_stats",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub prefix: CachePrefix,
    pub fingerprint: u64,
}

impl CacheKey {
    /// Key for an endpoint called without parameters.
    pub fn bare(prefix: CachePrefix) -> Self {
        Self {
            prefix,
            fingerprint: 0,
        }
    }

    /// Key derived from request query parameters, order independent.
    pub fn for_params(prefix: CachePrefix, params: &[(String, String)]) -> Self {
        if params.is_empty() {
            return Self::bare(prefix);
        }

        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut hasher = DefaultHasher::new();
        for (key, value) in sorted {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }

        Self {
            prefix,
            fingerprint: hasher.finish(),
        }
    }

    /// Key for a single entity addressed by id.
    pub fn for_id(prefix: CachePrefix, id: Uuid) -> Self {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        Self {
            prefix,
            fingerprint: hasher.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let a = CacheKey::for_params(
            CachePrefix::PropertyList,
            &params(&[("status", "for_sale"), ("city", "Douala")]),
        );
        let b = CacheKey::for_params(
            CachePrefix::PropertyList,
            &params(&[("city", "Douala"), ("status", "for_sale")]),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_parameters_produce_different_keys() {
        let a = CacheKey::for_params(CachePrefix::PropertyList, &params(&[("page", "1")]));
        let b = CacheKey::for_params(CachePrefix::PropertyList, &params(&[("page", "2")]));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_params_collapse_to_bare_prefix() {
        let key = CacheKey::for_params(CachePrefix::PropertyStats, &[]);
        assert_eq!(key, CacheKey::bare(CachePrefix::PropertyStats));
    }

    #[test]
    fn id_keys_are_stable() {
        let id = Uuid::new_v4();
        assert_eq!(
            CacheKey::for_id(CachePrefix::PropertyDetail, id),
            CacheKey::for_id(CachePrefix::PropertyDetail, id)
        );
    }
}
