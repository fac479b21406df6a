//! Per-client fixed-window rate limiting.
//!
//! Each key gets a quota of `points` per `window`. A consume either fits in
//! the remaining budget (and is charged) or is rejected with the time until
//! the window resets. Rejections are advisory: nothing waits, and rejected
//! attempts are not charged, so a key never holds more than `points` in a
//! window.
//!
//! Optionally a key that exceeds its quota is blocked for `block` after the
//! rejection. The default block duration is zero.
//!
//! Backends:
//! - [`MemoryRateLimiter`]: per-process windows behind a mutex
//! - [`SqliteRateLimiter`]: windows in the shared database, updated with an
//!   atomic conditional increment per key

mod memory;
mod sqlite;
pub(crate) mod window;

use std::time::Duration;

use async_trait::async_trait;

use crate::error_handling::RateLimitError;

pub use memory::MemoryRateLimiter;
pub use sqlite::SqliteRateLimiter;
pub use window::{QuotaPolicy, WindowState};

/// Result of a consume attempt that reached a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// The points were charged.
    Allowed { remaining: u32 },
    /// The budget is exhausted; `retry_after` is the time until it resets.
    Throttled { retry_after: Duration },
}

impl Consumption {
    pub fn is_throttled(&self) -> bool {
        matches!(self, Consumption::Throttled { .. })
    }
}

/// Rate limiter contract used by the admission path.
///
/// Implementations must make each consume an atomic check-and-charge per
/// key: concurrent callers never push a key past its quota.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Charges `points` against `key`.
    ///
    /// # Errors
    ///
    /// `RateLimitError::EmptyKey` / `InvalidPoints` for bad input, and
    /// `RateLimitError::Storage` when the counter store fails. A throttle
    /// is not an error.
    async fn consume(&self, key: &str, points: u32) -> Result<Consumption, RateLimitError>;
}

pub(crate) fn validate(key: &str, points: u32) -> Result<(), RateLimitError> {
    if key.is_empty() {
        return Err(RateLimitError::EmptyKey);
    }
    if points == 0 {
        return Err(RateLimitError::InvalidPoints);
    }
    Ok(())
}
