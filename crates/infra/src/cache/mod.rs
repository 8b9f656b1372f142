//! Redis-backed rate-limit store and cache housekeeping

pub mod janitor;
pub mod window_store;

use std::time::Duration;

use redis::aio::ConnectionManager;
use storesync_domain::{RedisConfig, Result, StoreSyncError};
use tracing::info;

use crate::errors::InfraError;

pub use janitor::RedisCacheJanitor;
pub use window_store::RedisWindowStore;

/// Open a multiplexed, auto-reconnecting connection to Redis.
///
/// Fails when the server cannot be reached within `timeout`.
pub async fn connect(config: &RedisConfig, timeout: Duration) -> Result<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str())
        .map_err(|e| StoreSyncError::Config(format!("invalid redis url: {e}")))?;

    let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
        .await
        .map_err(|_| StoreSyncError::Timeout(format!("redis connect after {timeout:?}")))?
        .map_err(|e| StoreSyncError::from(InfraError::from(e)))?;

    info!(url = %redacted(&config.url), "redis connection established");
    Ok(manager)
}

/// Strip credentials from a connection URL before logging it
fn redacted(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable>".to_string(),
    }
}
