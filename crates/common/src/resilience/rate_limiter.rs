//! Sliding-window rate limiting over a shared store
//!
//! [`SlidingWindowLimiter::check`] bounds how many calls a logical caller may
//! make inside any rolling window. The window itself lives behind
//! [`RateLimitStore`], whose `record` must prune, count and insert as one
//! atomic step so concurrent callers can never exceed the limit.
//!
//! When the store is unreachable the limiter fails closed: the call is denied
//! and `retry_after_ms` is the full window.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Clock, ResilienceError, ResilienceResult, SystemClock};

/// Outcome of one `check` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    /// Denial used when the store cannot answer
    pub const fn fail_closed(window_ms: u64) -> Self {
        Self { allowed: false, remaining: 0, retry_after_ms: window_ms }
    }
}

/// Key for a generic guarded operation: `rl:<name>:<id>`
pub fn operation_key(name: &str, id: &str) -> String {
    format!("rl:{name}:{id}")
}

/// Key for one external credential: `<provider>:ratelimit:<credentialId>`
pub fn credential_key(provider: &str, credential_id: &str) -> String {
    format!("{provider}:ratelimit:{credential_id}")
}

/// Shared counter store backing the sliding window
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically drop entries older than `now_ms - window_ms`, then either
    /// record `now_ms` (when fewer than `limit` remain) or report when the
    /// oldest entry leaves the window. The key's TTL is refreshed to the
    /// window on every recorded call.
    async fn record(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> ResilienceResult<RateLimitDecision>;

    /// Reachability probe for health checks
    async fn ping(&self) -> ResilienceResult<()>;
}

/// Rolling-window limiter
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock) }
    }
}

impl SlidingWindowLimiter<SystemClock> {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    pub fn with_clock(store: Arc<dyn RateLimitStore>, clock: C) -> Self {
        Self { store, clock: Arc::new(clock) }
    }

    /// Check and record one call for `key`.
    ///
    /// Never errors: a store failure is logged and returned as a denial.
    pub async fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let window_ms = duration_millis(window);
        match self.try_check(key, limit, window).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(key, error = %err, "rate limit store unavailable, denying call");
                RateLimitDecision::fail_closed(window_ms)
            }
        }
    }

    /// Like [`check`](Self::check) but surfaces store failures.
    pub async fn try_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> ResilienceResult<RateLimitDecision> {
        let window_ms = duration_millis(window);
        let now_ms = self.clock.millis_since_epoch();
        let decision = self.store.record(key, limit, window_ms, now_ms).await?;
        debug!(
            key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            retry_after_ms = decision.retry_after_ms,
            "rate limit checked"
        );
        Ok(decision)
    }

    /// Check `key` and turn a denial into [`ResilienceError::RateLimited`].
    pub async fn acquire(&self, key: &str, limit: u32, window: Duration) -> ResilienceResult<u32> {
        let decision = self.check(key, limit, window).await;
        if decision.allowed {
            Ok(decision.remaining)
        } else {
            Err(ResilienceError::RateLimited {
                key: key.to_string(),
                retry_after: Duration::from_millis(decision.retry_after_ms),
            })
        }
    }

    /// Store reachability
    pub async fn ping(&self) -> ResilienceResult<()> {
        self.store.ping().await
    }
}

fn duration_millis(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}

/// Process-local store used by tests and single-node deployments.
///
/// Every `record` runs under one mutex, which gives the same atomicity as
/// the scripted server-side implementation.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: Mutex<HashMap<String, Window>>,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct Window {
    stamps: VecDeque<u64>,
    expires_at_ms: u64,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call errors until re-enabled
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of live entries for `key`
    pub fn len(&self, key: &str) -> usize {
        self.windows.lock().get(key).map_or(0, |w| w.stamps.len())
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    fn ensure_available(&self) -> ResilienceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ResilienceError::StoreUnavailable {
                message: "in-memory store disabled".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for InMemoryWindowStore {
    async fn record(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> ResilienceResult<RateLimitDecision> {
        self.ensure_available()?;

        let mut windows = self.windows.lock();
        windows.retain(|_, w| w.expires_at_ms > now_ms);
        let window = windows.entry(key.to_string()).or_default();

        let floor = now_ms.saturating_sub(window_ms);
        while window.stamps.front().is_some_and(|&oldest| oldest <= floor) {
            window.stamps.pop_front();
        }

        let count = u32::try_from(window.stamps.len()).unwrap_or(u32::MAX);
        if count < limit {
            window.stamps.push_back(now_ms);
            window.expires_at_ms = now_ms.saturating_add(window_ms);
            return Ok(RateLimitDecision {
                allowed: true,
                remaining: limit - count - 1,
                retry_after_ms: 0,
            });
        }

        let retry_after_ms = window
            .stamps
            .front()
            .map_or(window_ms, |&oldest| (oldest + window_ms).saturating_sub(now_ms));
        Ok(RateLimitDecision { allowed: false, remaining: 0, retry_after_ms })
    }

    async fn ping(&self) -> ResilienceResult<()> {
        self.ensure_available()
    }
}
