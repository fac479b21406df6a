//! Process-local rate limiter.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::window::{QuotaPolicy, WindowState};
use super::{validate, Consumption, RateLimiter};
use crate::error_handling::RateLimitError;
use crate::storage::now_ms;

/// In-memory fixed-window limiter.
///
/// All keys share one mutex; the critical section is a map lookup and a
/// little arithmetic.
pub struct MemoryRateLimiter {
    policy: QuotaPolicy,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl MemoryRateLimiter {
    pub fn new(policy: QuotaPolicy) -> Self {
        MemoryRateLimiter {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn consume_at(
        &self,
        key: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<Consumption, RateLimitError> {
        validate(key, points)?;
        let mut windows = self.windows.lock().await;

        // Drop stale windows so idle keys do not accumulate
        if windows.len() > 10_000 {
            windows.retain(|_, w| !w.is_expired(now_ms));
        }

        let current = windows.get(key).copied();
        let (next, decision) = self.policy.apply(current, points, now_ms);
        windows.insert(key.to_string(), next);
        Ok(decision)
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn consume(&self, key: &str, points: u32) -> Result<Consumption, RateLimitError> {
        self.consume_at(key, points, now_ms()).await
    }
}
