//! Redis sorted-set store for the sliding-window rate limiter
//!
//! Each key holds one member per recorded call, scored by its timestamp.
//! Prune, count and insert run in a single Lua script so concurrent workers
//! can never admit more than `limit` calls per window.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};
use storesync_common::resilience::{
    RateLimitDecision, RateLimitStore, ResilienceError, ResilienceResult,
};
use tracing::debug;
use uuid::Uuid;

const SLIDING_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)

if count < limit then
  redis.call('ZADD', key, now, member)
  redis.call('PEXPIRE', key, window)
  return {1, limit - count - 1, 0}
end

local retry = window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  retry = tonumber(oldest[2]) + window - now
  if retry < 0 then retry = 0 end
end
return {0, 0, retry}
";

pub struct RedisWindowStore {
    manager: ConnectionManager,
    script: Script,
    key_prefix: Option<String>,
}

impl RedisWindowStore {
    pub fn new(manager: ConnectionManager, key_prefix: Option<String>) -> Self {
        Self { manager, script: Script::new(SLIDING_WINDOW_SCRIPT), key_prefix }
    }

    fn scoped(&self, key: &str) -> String {
        match self.key_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{key}"),
            _ => key.to_string(),
        }
    }
}

fn store_unavailable(err: RedisError) -> ResilienceError {
    ResilienceError::StoreUnavailable { message: err.to_string() }
}

/// Decode the script reply `{allowed, remaining, retry_after_ms}`
fn decode_reply(reply: &[i64], window_ms: u64) -> ResilienceResult<RateLimitDecision> {
    match reply {
        [allowed, remaining, retry_after] => Ok(RateLimitDecision {
            allowed: *allowed == 1,
            remaining: u32::try_from(*remaining).unwrap_or(0),
            retry_after_ms: u64::try_from(*retry_after).unwrap_or(window_ms),
        }),
        other => Err(ResilienceError::StoreUnavailable {
            message: format!("unexpected rate limit script reply: {other:?}"),
        }),
    }
}

#[async_trait]
impl RateLimitStore for RedisWindowStore {
    async fn record(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> ResilienceResult<RateLimitDecision> {
        let key = self.scoped(key);
        let member = format!("{now_ms}-{}", Uuid::new_v4());
        let mut conn = self.manager.clone();

        let reply: Vec<i64> = self
            .script
            .key(&key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(store_unavailable)?;

        debug!(key = %key, ?reply, "sliding window script evaluated");
        decode_reply(&reply, window_ms)
    }

    async fn ping(&self) -> ResilienceResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(store_unavailable)?;
        Ok(())
    }
}
