//! Fixed-window request limiting per user, checked before a grading request is accepted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RateLimitCfg;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateDecision;
}

/// Allows everything.
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn check(&self, _key: &str) -> RateDecision {
        RateDecision::Allow
    }
}

pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, windows: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        if windows.len() > 10_000 {
            windows.retain(|_, (start, _)| now.duration_since(*start) < self.window);
        }
        let (start, count) = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(*start) >= self.window {
            *start = now;
            *count = 0;
        }
        if *count >= self.limit {
            let retry_after = self.window.saturating_sub(now.duration_since(*start));
            debug!(target: "sql_grader", %key, limit = self.limit, "Rate limited");
            return RateDecision::Deny { retry_after };
        }
        *count += 1;
        RateDecision::Allow
    }
}

pub fn from_config(cfg: &RateLimitCfg) -> Arc<dyn RateLimiter> {
    match cfg.requests_per_minute {
        0 => Arc::new(Unlimited),
        n => Arc::new(FixedWindowLimiter::new(n, Duration::from_secs(60))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denies_after_limit_until_window_rolls() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_millis(200));
        assert_eq!(limiter.check("u").await, RateDecision::Allow);
        assert_eq!(limiter.check("u").await, RateDecision::Allow);
        assert!(matches!(limiter.check("u").await, RateDecision::Deny { .. }));
        assert_eq!(limiter.check("other").await, RateDecision::Allow);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(limiter.check("u").await, RateDecision::Allow);
    }

    #[tokio::test]
    async fn zero_means_unlimited() {
        let limiter = from_config(&RateLimitCfg { requests_per_minute: 0 });
        for _ in 0..100 {
            assert_eq!(limiter.check("u").await, RateDecision::Allow);
        }
    }
}
