//! Fixed quota window arithmetic shared by every backend.

use std::time::Duration;

use super::Consumption;

/// Quota configuration: `points` per `window`, plus an optional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub points: u32,
    pub window: Duration,
    pub block: Duration,
}

impl QuotaPolicy {
    pub fn new(points: u32, window: Duration, block: Duration) -> Self {
        QuotaPolicy {
            points,
            window,
            block,
        }
    }

    fn window_ms(&self) -> i64 {
        duration_ms(self.window)
    }

    fn block_ms(&self) -> i64 {
        duration_ms(self.block)
    }

    /// Applies a consume of `points` at `now_ms` to `state`.
    ///
    /// `state` is `None` for a key that has never been seen. Returns the
    /// state to store and the decision.
    pub fn apply(
        &self,
        state: Option<WindowState>,
        points: u32,
        now_ms: i64,
    ) -> (WindowState, Consumption) {
        let mut state = match state {
            Some(s) if !s.is_expired(now_ms) => s,
            _ => WindowState::open(now_ms, self.window_ms()),
        };

        if state.blocked_until_ms > now_ms {
            let retry_after = ms_duration(state.blocked_until_ms - now_ms);
            return (state, Consumption::Throttled { retry_after });
        }

        if let Some(consumed) = state.consumed.checked_add(points) {
            if consumed <= self.points {
                state.consumed = consumed;
                let remaining = self.points - consumed;
                return (state, Consumption::Allowed { remaining });
            }
        }

        let retry_after = if self.block.is_zero() {
            ms_duration(state.window_end_ms - now_ms)
        } else {
            state.blocked_until_ms = now_ms + self.block_ms();
            self.block
        };
        (state, Consumption::Throttled { retry_after })
    }
}

/// Stored counter for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub consumed: u32,
    pub window_end_ms: i64,
    pub blocked_until_ms: i64,
}

impl WindowState {
    fn open(now_ms: i64, window_ms: i64) -> Self {
        WindowState {
            consumed: 0,
            window_end_ms: now_ms + window_ms,
            blocked_until_ms: 0,
        }
    }

    /// A window is over once its end has passed and no block is pending.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.window_end_ms && now_ms >= self.blocked_until_ms
    }
}

pub(crate) fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn ms_duration(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
