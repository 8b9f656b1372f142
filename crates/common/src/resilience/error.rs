use std::convert::Infallible;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the resilience primitives.
///
/// Generic over the guarded operation's error type `E` so the original error
/// is preserved in [`ResilienceError::OperationFailed`]. Primitives that never
/// run a caller operation use the default `Infallible` parameter.
#[derive(Debug, Error)]
pub enum ResilienceError<E = Infallible>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Breaker for `key` is open and its cooldown has not elapsed
    #[error("circuit open for {key}")]
    CircuitOpen { key: String },

    /// Rolling window for `key` is full
    #[error("rate limit exceeded for {key}, retry after {retry_after:?}")]
    RateLimited { key: String, retry_after: Duration },

    /// Shared rate-limit store could not be reached
    #[error("rate limit store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// The underlying operation failed
    #[error("operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },

    /// Configuration error
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// True for the protection kinds (open circuit, exhausted window).
    pub const fn is_protection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RateLimited { .. })
    }

    /// Re-type an error that carries no operation failure.
    pub fn widen(err: ResilienceError<Infallible>) -> Self {
        match err {
            ResilienceError::CircuitOpen { key } => Self::CircuitOpen { key },
            ResilienceError::RateLimited { key, retry_after } => {
                Self::RateLimited { key, retry_after }
            }
            ResilienceError::StoreUnavailable { message } => Self::StoreUnavailable { message },
            ResilienceError::InvalidConfiguration { message } => {
                Self::InvalidConfiguration { message }
            }
            ResilienceError::OperationFailed { source } => match source {},
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E = Infallible> = Result<T, ResilienceError<E>>;
