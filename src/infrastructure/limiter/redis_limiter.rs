use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use redis::Script;

use crate::{
    errors::LimiterError,
    repositories::rate_limit::{RateDecision, RateLimitStore},
};

/// Check-and-increment in one round trip. The first hit of a window sets
/// the expiry, so the key disappears when the window ends.
///
/// Returns `{allowed, remaining_or_pttl}`.
const FIXED_WINDOW_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local limit = tonumber(ARGV[2])
if current >= limit then
    return {0, redis.call('PTTL', KEYS[1])}
end
current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return {1, limit - current}
";

/// Limiter backed by a shared Redis so several instances enforce one budget.
#[derive(Clone)]
pub struct RedisRateLimiter {
    pool: Pool,
    script: Script,
    window: Duration,
    key_prefix: String,
}

impl RedisRateLimiter {
    pub fn new(redis_url: &str, window: Duration, key_prefix: impl Into<String>) -> Result<Self, LimiterError> {
        let pool = RedisConfig::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| LimiterError::RedisConnection(e.to_string()))?;

        Ok(Self {
            pool,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            window,
            key_prefix: key_prefix.into(),
        })
    }

    fn key_for(&self, identity: &str) -> String {
        format!("{}:{}", self.key_prefix, urlencoding::encode(identity))
    }

    pub async fn ping(&self) -> Result<(), LimiterError> {
        let mut conn = self.pool.get().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(LimiterError::RedisOperation(format!("unexpected PING reply: {pong}")))
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimiter {
    async fn check(&self, limit: u32, key: &str) -> Result<RateDecision, LimiterError> {
        let mut conn = self.pool.get().await?;
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);

        let (allowed, value): (i64, i64) = self
            .script
            .key(self.key_for(key))
            .arg(window_ms)
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        if allowed == 1 {
            Ok(RateDecision::Allowed { remaining: u32::try_from(value).unwrap_or(0) })
        } else {
            // PTTL is negative when the key has no expiry; fall back to a full window.
            let reset_in = u64::try_from(value)
                .map(Duration::from_millis)
                .unwrap_or(self.window);
            Ok(RateDecision::Rejected { reset_in })
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), LimiterError> {
        RedisRateLimiter::ping(self).await
    }
}
