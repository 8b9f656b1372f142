//! Token bucket for process-local start-rate ceilings
//!
//! The job worker acquires one token before starting each job, which caps
//! how many jobs may start per refill interval regardless of pool size.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::{Clock, ResilienceError, ResilienceResult, SystemClock};

/// Configuration for token bucket rate limiter
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket can hold
    pub capacity: u64,
    /// Number of tokens to refill per interval
    pub refill_amount: u64,
    /// Time interval for token refill
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self { capacity: 50, refill_amount: 50, refill_interval: Duration::from_secs(1) }
    }
}

impl TokenBucketConfig {
    /// `per_interval` starts allowed per `interval`, with bursts of the same size
    pub const fn per_interval(per_interval: u64, interval: Duration) -> Self {
        Self { capacity: per_interval, refill_amount: per_interval, refill_interval: interval }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ResilienceResult<()> {
        let message = if self.capacity == 0 {
            "capacity must be greater than 0"
        } else if self.refill_amount == 0 {
            "refill_amount must be greater than 0"
        } else if self.refill_interval.is_zero() {
            "refill_interval must be greater than zero"
        } else {
            return Ok(());
        };
        Err(ResilienceError::InvalidConfiguration { message: message.to_string() })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u64,
    last_refill: Instant,
}

/// Token bucket rate limiter
pub struct TokenBucket<C: Clock = SystemClock> {
    config: TokenBucketConfig,
    bucket: Arc<Mutex<Bucket>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for TokenBucket<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            bucket: Arc::clone(&self.bucket),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl TokenBucket<SystemClock> {
    /// Create a new token bucket with system clock
    pub fn new(config: TokenBucketConfig) -> ResilienceResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a new token bucket with custom clock
    pub fn with_clock(config: TokenBucketConfig, clock: C) -> ResilienceResult<Self> {
        config.validate()?;
        let bucket = Bucket { tokens: config.capacity, last_refill: clock.now() };
        Ok(Self { config, bucket: Arc::new(Mutex::new(bucket)), clock: Arc::new(clock) })
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = self.clock.now();
        let elapsed = now.duration_since(bucket.last_refill);
        let interval_ms = self.config.refill_interval.as_millis().max(1);
        let refills = u64::try_from(elapsed.as_millis() / interval_ms).unwrap_or(u64::MAX);

        if refills > 0 {
            let added = refills.saturating_mul(self.config.refill_amount);
            bucket.tokens = bucket.tokens.saturating_add(added).min(self.config.capacity);
            // Keep the partial interval so refills do not drift
            let whole = self.config.refill_interval.saturating_mul(
                u32::try_from(refills).unwrap_or(u32::MAX),
            );
            bucket.last_refill = bucket.last_refill.checked_add(whole).unwrap_or(now);
        }
    }

    /// Try to take `tokens` without waiting
    pub fn try_acquire(&self, tokens: u64) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens < tokens {
            return false;
        }
        bucket.tokens -= tokens;
        true
    }

    /// Time until the next refill lands
    pub fn time_until_refill(&self) -> Duration {
        let bucket = self.bucket.lock();
        let elapsed = self.clock.now().duration_since(bucket.last_refill);
        self.config.refill_interval.saturating_sub(elapsed)
    }

    /// Wait (on the tokio timer) until one token is available, then take it
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire(1) {
                return;
            }
            let wait = self.time_until_refill().max(Duration::from_millis(1));
            debug!(wait_ms = wait.as_millis() as u64, "start rate ceiling reached");
            tokio::time::sleep(wait).await;
        }
    }

    /// Get the current number of available tokens
    pub fn available_tokens(&self) -> u64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }
}
