//! Per-client token bucket admission control
//!
//! Each client IP owns a bucket that starts full at `burst` tokens and refills
//! at `requests_per_second`. A request spends one token or is rejected with 429.
//! A sweeper task evicts buckets that have been idle past the configured window.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::LimiterConfig;
use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    sweep_interval: Duration,
    idle_timeout: Duration,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            rate: config.requests_per_second,
            burst: f64::from(config.burst),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        self.check_at(ip, Instant::now())
    }

    /// Refill and spend under one lock acquisition.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitDecision {
        let mut buckets = self.lock();
        let bucket = buckets.entry(ip).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }

    /// Drop buckets not seen for longer than the idle window. Returns how many went.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= self.idle_timeout);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.sweep_interval);
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.sweep_at(Instant::now());
                if evicted > 0 {
                    debug!("Rate limiter evicted {} idle clients", evicted);
                }
            }
        })
    }

    // A poisoned lock still guards a consistent map; every critical section is panic-free arithmetic.
    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission middleware. Needs the server to be built with connect info.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .ok_or_else(|| ApiError::internal("client address unavailable for rate limiting"))?;

    match limiter.check(ip) {
        RateLimitDecision::Allowed => Ok(next.run(request).await),
        RateLimitDecision::Limited => {
            warn!("Rate limit exceeded for {}", ip);
            Err(ApiError::rate_limit_exceeded())
        }
    }
}
