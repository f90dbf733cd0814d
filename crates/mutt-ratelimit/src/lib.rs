//! A sliding-window rate limiter whose window lives in the substrate as a
//! sorted set, so every Deliverer instance draws from one shared budget
//! instead of each enforcing its own local limit.

use mutt_queue::QueueClient;
use rand::Rng;
use redis::Script;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count < max_requests then
  redis.call('ZADD', key, now, member)
  redis.call('EXPIRE', key, window + 1)
  return 1
end
return 0
"#;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

/// A named sliding-window limiter (one instance today: `"moog"`, guarding
/// the rate of outbound webhook calls).
pub struct RateLimiter {
    key: String,
    queue: QueueClient,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(key: impl Into<String>, queue: QueueClient, config: RateLimitConfig) -> Self {
        Self { key: key.into(), queue, config }
    }

    /// Attempt to consume one slot from the window. `true` means the
    /// caller may proceed; `false` means the window is full and the
    /// caller should back off.
    pub async fn try_acquire(&self) -> mutt_queue::QueueResult<bool> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
        let member: u64 = rand::thread_rng().gen();
        let allowed: i64 = self
            .queue
            .run_atomic_script(
                &Script::new(SCRIPT),
                &[self.key.clone()],
                &[
                    now.to_string(),
                    self.config.window.as_secs_f64().to_string(),
                    self.config.max_requests.to_string(),
                    member.to_string(),
                ],
            )
            .await?;
        Ok(allowed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_window_and_max_requests() {
        let config = RateLimitConfig { window: Duration::from_secs(1), max_requests: 50 };
        assert_eq!(config.max_requests, 50);
        assert_eq!(config.window, Duration::from_secs(1));
    }
}
