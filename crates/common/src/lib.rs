//! Modular common utilities shared across StoreSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: cron expression parsing and other pure helpers
//! - `runtime`: async resilience primitives (clock, circuit breaker registry,
//!   sliding-window rate limiter, token bucket)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
    Clock, InMemoryWindowStore, MockClock, RateLimitDecision, RateLimitStore, ResilienceError,
    SlidingWindowLimiter, SystemClock, TokenBucket, TokenBucketConfig,
};
#[cfg(feature = "foundation")]
pub use time::{CronExpression, CronParseError};
