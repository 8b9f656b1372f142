//! Per-credential circuit breakers
//!
//! A [`CircuitBreaker`] tracks one remote credential. The
//! [`CircuitBreakerRegistry`] owns one breaker per key and is meant to be
//! created once per process and injected wherever outbound calls are made, so
//! one tenant's failing credential never trips another tenant's breaker.
//!
//! Transitions:
//! - `Closed -> Open` after `failure_threshold` consecutive failures
//! - `Open -> HalfOpen` on the first call after `cooldown` has elapsed
//! - `HalfOpen -> Closed` after `success_threshold` consecutive successes
//! - `HalfOpen -> Open` on any failure
//!
//! Any success resets the consecutive failure count. A half-open call whose
//! future is dropped before it finishes gives its slot back.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{Clock, ResilienceError, ResilienceResult, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected without running
    Open,
    /// Limited probe calls test whether the remote has recovered
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label used in logs and metrics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: u32,
    /// Time to wait before an open circuit admits a probe
    pub cooldown: Duration,
    /// Probe calls admitted per half-open period
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            cooldown: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ResilienceResult<()> {
        if self.failure_threshold == 0 {
            return Err(ResilienceError::InvalidConfiguration {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }
        if self.success_threshold == 0 {
            return Err(ResilienceError::InvalidConfiguration {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }
        if self.half_open_max_calls < self.success_threshold {
            return Err(ResilienceError::InvalidConfiguration {
                message: "half_open_max_calls must be at least success_threshold".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        if self.config.half_open_max_calls < threshold {
            self.config.half_open_max_calls = threshold;
        }
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn build(self) -> ResilienceResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub opened_at: Option<Instant>,
    pub total_calls: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    half_open_calls: u32,
    /// Bumped on every `Open -> HalfOpen` transition
    half_open_period: u64,
    opened_at: Option<Instant>,
    total_calls: u64,
    rejected_calls: u64,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_calls: 0,
            half_open_period: 0,
            opened_at: None,
            total_calls: 0,
            rejected_calls: 0,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.half_open_successes = 0;
        self.half_open_calls = 0;
    }
}

/// Circuit breaker for a single key
pub struct CircuitBreaker<C: Clock = SystemClock> {
    key: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker for `key` sharing `clock` with its registry
    pub fn new(
        key: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> ResilienceResult<Self> {
        config.validate()?;
        Ok(Self { key: key.into(), config, inner: Mutex::new(BreakerState::new()), clock })
    }

    /// Admit or reject a call, moving `Open -> HalfOpen` once cooldown elapses.
    ///
    /// Admission and the half-open probe count are updated under one lock so
    /// concurrent callers cannot overrun `half_open_max_calls`.
    pub fn try_acquire(&self) -> bool {
        self.admit().is_some()
    }

    /// Admission decision; `Some(Some(period))` for a half-open slot
    fn admit(&self) -> Option<Option<u64>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let admitted = match inner.state {
            CircuitState::Closed => Some(None),
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .map_or(true, |opened| now.duration_since(opened) >= self.config.cooldown);
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_calls = 1;
                    inner.half_open_period += 1;
                    info!(key = %self.key, "circuit half-open, admitting trial call");
                    Some(Some(inner.half_open_period))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    Some(Some(inner.half_open_period))
                } else {
                    None
                }
            }
        };

        if admitted.is_some() {
            inner.total_calls += 1;
        } else {
            inner.rejected_calls += 1;
        }
        admitted
    }

    /// Give back a half-open slot whose call never reported an outcome
    fn release_half_open_slot(&self, period: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_period == period {
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
            debug!(key = %self.key, "half-open call abandoned, slot released");
        }
    }

    /// Run `operation` under breaker protection
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(period) = self.admit() else {
            debug!(key = %self.key, "circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen { key: self.key.clone() });
        };

        let mut slot = HalfOpenSlot { breaker: self, period };
        let outcome = operation().await;
        slot.period = None;

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.config.success_threshold {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                inner.half_open_successes = 0;
                inner.half_open_calls = 0;
                info!(key = %self.key, "circuit closed after successful probes");
            }
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.open(now);
                    warn!(
                        key = %self.key,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.open(now);
                warn!(key = %self.key, "half-open call failed, circuit reopened");
            }
            CircuitState::Open => {}
        }
    }

    /// Current state without triggering transitions
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot for health and diagnostics
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            opened_at: inner.opened_at,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
        }
    }

    /// Force the breaker back to closed
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::new();
        info!(key = %self.key, "circuit manually reset");
    }
}

/// Releases a half-open slot if the call is dropped mid-flight
struct HalfOpenSlot<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    period: Option<u64>,
}

impl<C: Clock> Drop for HalfOpenSlot<'_, C> {
    fn drop(&mut self) {
        if let Some(period) = self.period {
            self.breaker.release_half_open_slot(period);
        }
    }
}

/// Keyed registry of independent breakers
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    clock: Arc<C>,
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
}

impl<C: Clock> fmt::Debug for CircuitBreakerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &self.breakers.len())
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Registry on the system clock
    pub fn new(config: CircuitBreakerConfig) -> ResilienceResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    /// Registry on a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ResilienceResult<Self> {
        config.validate()?;
        Ok(Self { config, clock: Arc::new(clock), breakers: DashMap::new() })
    }

    /// Breaker for `key`, created closed on first use
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker<C>> {
        if let Some(existing) = self.breakers.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self.breakers.entry(key.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker {
                key: key.to_string(),
                config: self.config.clone(),
                inner: Mutex::new(BreakerState::new()),
                clock: Arc::clone(&self.clock),
            })
        });
        Arc::clone(entry.value())
    }

    /// Run `operation` under the breaker for `key`.
    ///
    /// While that breaker is open and cooling down this returns
    /// [`ResilienceError::CircuitOpen`] without invoking `operation`.
    pub async fn guard<F, Fut, T, E>(&self, key: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.breaker(key).execute(operation).await
    }

    /// State of `key`, `Closed` when never seen
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers.get(key).map_or(CircuitState::Closed, |b| b.state())
    }

    /// Keys whose breaker is currently open
    pub fn open_keys(&self) -> Vec<String> {
        self.breakers
            .iter()
            .filter(|entry| entry.value().state() == CircuitState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }
}
