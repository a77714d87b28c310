//! Per-owner request throttling
//!
//! Sliding window: each key keeps the timestamps of its requests inside the
//! window, and a request is refused once the window is full.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use botbrawl_types::{BrawlError, OwnerId, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Rate limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Requests allowed per owner per window
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_window() -> u32 {
    120
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone)]
struct RateBucket {
    requests: Vec<Instant>,
}

/// Rate limiter service; clones share buckets
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<String, RateBucket>>>,
}

/// Current standing of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Count one request for `owner_id`, or refuse it
    pub async fn check_owner(&self, owner_id: &OwnerId) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let key = format!("owner:{}", owner_id);
        self.check_limit(&key, self.config.requests_per_window, self.config.window())
            .await
    }

    async fn check_limit(&self, key: &str, limit: u32, window: Duration) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        let bucket = buckets
            .entry(key.to_string())
            .or_insert(RateBucket { requests: Vec::new() });
        bucket.requests.retain(|&t| now.duration_since(t) < window);

        if bucket.requests.len() >= limit as usize {
            let retry_after = bucket
                .requests
                .first()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            return Err(BrawlError::RateLimitExceeded {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        bucket.requests.push(now);
        Ok(())
    }

    pub async fn info(&self, owner_id: &OwnerId) -> RateLimitInfo {
        let key = format!("owner:{}", owner_id);
        let window = self.config.window();
        let now = Instant::now();
        let used = self
            .buckets
            .read()
            .await
            .get(&key)
            .map(|b| b.requests.iter().filter(|&&t| now.duration_since(t) < window).count() as u32)
            .unwrap_or(0);

        RateLimitInfo {
            limit: self.config.requests_per_window,
            remaining: self.config.requests_per_window.saturating_sub(used),
        }
    }

    /// Drop buckets with no request inside the window
    pub async fn cleanup(&self) {
        let window = self.config.window();
        let now = Instant::now();
        self.buckets
            .write()
            .await
            .retain(|_, bucket| bucket.requests.iter().any(|&t| now.duration_since(t) < window));
    }
}
