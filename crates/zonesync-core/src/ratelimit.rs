//! Token bucket rate limiting
//!
//! One [`RateLimiter`] bounds the outbound request rate of one credential
//! profile. Buckets refill lazily on every acquire from the elapsed time
//! since the last refill; there is no background timer.
//!
//! Tokens are tracked as integer nano-tokens (one token is 10^9 units), so
//! a refill of `R` tokens per second adds exactly `R` units per elapsed
//! nanosecond and burst bounds hold without floating point drift.
//!
//! Waiters are served in arrival order: the bucket sits behind a
//! `tokio::sync::Mutex` (which is FIFO), and a waiter keeps the lock while
//! it sleeps for its deficit, so later arrivals queue behind it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

const UNITS_PER_TOKEN: u128 = 1_000_000_000;

#[derive(Debug)]
struct Bucket {
    units: u128,
    last_refill: Instant,
}

/// Token bucket for one credential profile
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_per_sec: u32,
    blocking: bool,
    bucket: tokio::sync::Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            refill_per_sec: config.refill_per_sec,
            blocking: config.blocking,
            bucket: tokio::sync::Mutex::new(Bucket {
                units: u128::from(config.capacity) * UNITS_PER_TOKEN,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Bucket capacity in tokens
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Refill rate in tokens per second
    pub fn refill_per_sec(&self) -> u32 {
        self.refill_per_sec
    }

    /// Wait until `cost` tokens are available, then debit them
    ///
    /// A cost of zero is treated as one; a cost above capacity is clamped to
    /// capacity so it can always be granted eventually.
    pub async fn acquire(&self, cost: u32) {
        let need = self.units_for(cost);
        let mut bucket = self.bucket.lock().await;
        loop {
            self.refill(&mut bucket);
            if bucket.units >= need {
                bucket.units -= need;
                trace!(
                    "Acquired {} token(s), {} left",
                    need / UNITS_PER_TOKEN,
                    bucket.units / UNITS_PER_TOKEN
                );
                return;
            }
            let wait = self.wait_for(need - bucket.units);
            debug!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Debit `cost` tokens if they are available right now
    ///
    /// Returns `false` when the bucket is short or another caller is already
    /// queued for tokens.
    pub fn try_acquire(&self, cost: u32) -> bool {
        let need = self.units_for(cost);
        let Ok(mut bucket) = self.bucket.try_lock() else {
            return false;
        };
        self.refill(&mut bucket);
        if bucket.units >= need {
            bucket.units -= need;
            true
        } else {
            false
        }
    }

    /// Acquire according to the configured mode
    ///
    /// Blocking limiters wait and never fail; non-blocking ones fail with
    /// [`Error::RateLimitExhausted`] when no budget is available.
    pub async fn admit(&self, cost: u32) -> Result<()> {
        if self.blocking {
            self.acquire(cost).await;
            Ok(())
        } else if self.try_acquire(cost) {
            Ok(())
        } else {
            Err(Error::rate_limited(format!(
                "no budget for {} request(s) (capacity {}, refill {}/s)",
                cost.max(1),
                self.capacity,
                self.refill_per_sec
            )))
        }
    }

    /// Whole tokens currently available
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        u32::try_from(bucket.units / UNITS_PER_TOKEN).unwrap_or(u32::MAX)
    }

    fn units_for(&self, cost: u32) -> u128 {
        u128::from(cost.clamp(1, self.capacity)) * UNITS_PER_TOKEN
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_nanos();
        if elapsed == 0 {
            return;
        }
        let max = u128::from(self.capacity) * UNITS_PER_TOKEN;
        bucket.units = bucket
            .units
            .saturating_add(elapsed.saturating_mul(u128::from(self.refill_per_sec)))
            .min(max);
        bucket.last_refill = now;
    }

    fn wait_for(&self, deficit: u128) -> Duration {
        let rate = u128::from(self.refill_per_sec);
        let nanos = deficit.div_ceil(rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Per-profile limiter registry
///
/// Every transport for the same profile shares one bucket; distinct
/// profiles never contend.
#[derive(Debug)]
pub struct RateLimiters {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiters {
    /// Create a registry whose buckets use `config`
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// The limiter for `profile`, created on first use
    pub fn for_profile(&self, profile: &str) -> Result<Arc<RateLimiter>> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limiter) = buckets.get(profile) {
            return Ok(Arc::clone(limiter));
        }
        let limiter = Arc::new(RateLimiter::new(&self.config)?);
        buckets.insert(profile.to_string(), Arc::clone(&limiter));
        debug!(
            "Created rate limiter for profile '{}' ({} tokens, {}/s)",
            profile, self.config.capacity, self.config.refill_per_sec
        );
        Ok(limiter)
    }

    /// Profiles with a live bucket
    pub fn profiles(&self) -> Vec<String> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u32, refill_per_sec: u32, blocking: bool) -> RateLimitConfig {
        RateLimitConfig {
            capacity,
            refill_per_sec,
            blocking,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_refill() {
        let limiter = RateLimiter::new(&config(5, 5, true)).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire(1).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Sixth token needs 200ms of refill at 5/s
        limiter.acquire(1).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(200), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(210), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_never_waits() {
        let limiter = RateLimiter::new(&config(2, 1, false)).unwrap();
        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));

        let err = limiter.admit(1).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::RateLimitExhausted);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.admit(1).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_capacity() {
        let limiter = RateLimiter::new(&config(3, 10, true)).unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_cost_is_clamped() {
        let limiter = RateLimiter::new(&config(2, 1, true)).unwrap();
        limiter.acquire(50).await;
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(&config(1, 1, true)).unwrap());
        limiter.acquire(1).await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..4 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter.acquire(1).await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the lock queue before spawning the next
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn profiles_get_separate_buckets() {
        let limiters = RateLimiters::new(config(5, 1, true)).unwrap();
        let a1 = limiters.for_profile("a").unwrap();
        let a2 = limiters.for_profile("a").unwrap();
        let b = limiters.for_profile("b").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(limiters.profiles().len(), 2);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(RateLimiter::new(&config(0, 1, true)).is_err());
        assert!(RateLimiters::new(config(1, 0, true)).is_err());
    }
}
