use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding-window request limiter keyed by caller and route.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn allow(&self, key: &str, route: &str) -> bool {
        let bucket_key = format!("{key}:{route}");
        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        if entry.len() as u32 >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_ceiling_per_key_and_route() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 2);

        assert!(limiter.allow("user-a", "/api/v1/properties"));
        assert!(limiter.allow("user-a", "/api/v1/properties"));
        assert!(!limiter.allow("user-a", "/api/v1/properties"));

        // A different caller or route gets its own bucket.
        assert!(limiter.allow("user-b", "/api/v1/properties"));
        assert!(limiter.allow("user-a", "/api/v1/reviews"));
    }
}
