//! Resilience patterns for fault tolerance
//!
//! - **Circuit breaker registry**: one breaker per external credential
//! - **Sliding-window rate limiter**: shared-store call budgets per key
//! - **Token bucket**: process-local start-rate ceiling
//!
//! All primitives read time through [`Clock`] so tests can use [`MockClock`].

pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod rate_limiter;
pub mod token_bucket;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerRegistry,
    CircuitSnapshot, CircuitState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ResilienceError, ResilienceResult};
pub use rate_limiter::{
    credential_key, operation_key, InMemoryWindowStore, RateLimitDecision, RateLimitStore,
    SlidingWindowLimiter,
};
pub use token_bucket::{TokenBucket, TokenBucketConfig};
