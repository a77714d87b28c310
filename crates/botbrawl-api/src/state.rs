//! Application state shared across handlers

use std::sync::Arc;

use botbrawl_orchestrator::{Authenticator, BrawlEngine, RateLimiter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BrawlEngine>,
    pub auth: Arc<dyn Authenticator>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(engine: Arc<BrawlEngine>, auth: Arc<dyn Authenticator>, rate_limiter: RateLimiter) -> Self {
        Self {
            engine,
            auth,
            rate_limiter,
        }
    }
}
