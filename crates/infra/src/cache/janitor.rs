//! Cache housekeeping: give untimed cache keys a TTL

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use storesync_core::CacheJanitor;
use storesync_domain::{Result, StoreSyncError};
use tracing::{debug, info};

use crate::errors::InfraError;

const SCAN_BATCH: usize = 200;
/// TTL reply for a key that exists without an expiry
const NO_EXPIRY: i64 = -1;

pub struct RedisCacheJanitor {
    manager: ConnectionManager,
}

impl RedisCacheJanitor {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

fn map_redis(err: redis::RedisError) -> StoreSyncError {
    StoreSyncError::from(InfraError::from(err))
}

#[async_trait]
impl CacheJanitor for RedisCacheJanitor {
    async fn expire_untimed_keys(&self, pattern: &str, ttl_secs: i64) -> Result<u64> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut scanned = 0_u64;
        let mut expired = 0_u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(map_redis)?;

            for key in keys {
                scanned += 1;
                let ttl: i64 = redis::cmd("TTL").arg(&key).query_async(&mut conn).await.map_err(map_redis)?;
                if ttl != NO_EXPIRY {
                    continue;
                }
                let set: i64 = redis::cmd("EXPIRE")
                    .arg(&key)
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis)?;
                if set == 1 {
                    debug!(key = %key, ttl_secs, "cache key given expiry");
                    expired += 1;
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(pattern, scanned, expired, "cache cleanup finished");
        Ok(expired)
    }
}
