//! Registration store and rate limiter construction.

use std::sync::Arc;

use log::info;
use sqlx::SqlitePool;

use crate::config::{Config, StateBackend};
use crate::rate_limiter::{MemoryRateLimiter, QuotaPolicy, RateLimiter, SqliteRateLimiter};
use crate::registry::{ClientRegistry, MemoryClientRegistry, SqliteClientRegistry};

/// Creates the registration store for the configured backend.
pub fn init_client_registry(backend: StateBackend, pool: &SqlitePool) -> Arc<dyn ClientRegistry> {
    match backend {
        StateBackend::Shared => Arc::new(SqliteClientRegistry::new(pool.clone())),
        StateBackend::Local => Arc::new(MemoryClientRegistry::new()),
    }
}

/// Creates the per-client rate limiter from the configured quota.
pub fn init_rate_limiter(config: &Config, pool: &SqlitePool) -> Arc<dyn RateLimiter> {
    let policy = QuotaPolicy::new(
        config.rate_limit_points,
        config.rate_limit_window(),
        config.rate_limit_block(),
    );
    info!(
        "Rate limit: {} point(s) per {}s per client (block {}s, {:?} state)",
        config.rate_limit_points,
        config.rate_limit_window_secs,
        config.rate_limit_block_secs,
        config.state
    );
    match config.state {
        StateBackend::Shared => Arc::new(SqliteRateLimiter::new(pool.clone(), policy)),
        StateBackend::Local => Arc::new(MemoryRateLimiter::new(policy)),
    }
}
