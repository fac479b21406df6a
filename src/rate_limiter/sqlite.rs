//! Rate limiter with windows stored in the shared database.
//!
//! Every consume runs in one transaction whose first statement is a write,
//! so SQLite serializes concurrent consumes of any key (across workers and
//! processes) and the read-modify-write below cannot lose updates.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::window::{QuotaPolicy, WindowState};
use super::{validate, Consumption, RateLimiter};
use crate::error_handling::{DatabaseError, RateLimitError};
use crate::storage::now_ms;

/// Fixed-window limiter backed by the `rate_limits` table.
#[derive(Clone)]
pub struct SqliteRateLimiter {
    pool: SqlitePool,
    policy: QuotaPolicy,
}

impl SqliteRateLimiter {
    pub fn new(pool: SqlitePool, policy: QuotaPolicy) -> Self {
        SqliteRateLimiter { pool, policy }
    }

    pub(crate) async fn consume_at(
        &self,
        key: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<Consumption, RateLimitError> {
        validate(key, points)?;
        self.consume_in_tx(key, points, now_ms)
            .await
            .map_err(|e| RateLimitError::Storage(DatabaseError::SqlError(e)))
    }

    async fn consume_in_tx(
        &self,
        key: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<Consumption, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading
        sqlx::query(
            "INSERT INTO rate_limits (key, consumed, window_end_ms, blocked_until_ms)
             VALUES (?, 0, 0, 0)
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT consumed, window_end_ms, blocked_until_ms FROM rate_limits WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        let consumed: i64 = row.try_get("consumed")?;
        let current = WindowState {
            consumed: u32::try_from(consumed).unwrap_or(u32::MAX),
            window_end_ms: row.try_get("window_end_ms")?,
            blocked_until_ms: row.try_get("blocked_until_ms")?,
        };
        // A freshly inserted row has window_end_ms = 0 and is expired
        let (next, decision) = self.policy.apply(Some(current), points, now_ms);

        sqlx::query(
            "UPDATE rate_limits SET consumed = ?, window_end_ms = ?, blocked_until_ms = ?
             WHERE key = ?",
        )
        .bind(i64::from(next.consumed))
        .bind(next.window_end_ms)
        .bind(next.blocked_until_ms)
        .bind(key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(decision)
    }
}

#[async_trait]
impl RateLimiter for SqliteRateLimiter {
    async fn consume(&self, key: &str, points: u32) -> Result<Consumption, RateLimitError> {
        self.consume_at(key, points, now_ms()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::create_test_pool;
    use std::sync::Arc;
    use std::time::Duration;

    fn policy() -> QuotaPolicy {
        QuotaPolicy::new(20, Duration::from_secs(60), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_twenty_allowed_then_throttled() {
        let limiter = SqliteRateLimiter::new(create_test_pool().await, policy());
        for i in 0..20u32 {
            let decision = limiter.consume_at("u1", 1, 1_000).await.unwrap();
            assert_eq!(decision, Consumption::Allowed { remaining: 19 - i });
        }
        let decision = limiter.consume_at("u1", 1, 11_000).await.unwrap();
        assert_eq!(
            decision,
            Consumption::Throttled {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[tokio::test]
    async fn test_window_rolls_over() {
        let limiter = SqliteRateLimiter::new(create_test_pool().await, policy());
        for _ in 0..21 {
            limiter.consume_at("u1", 1, 0).await.unwrap();
        }
        assert_eq!(
            limiter.consume_at("u1", 1, 60_000).await.unwrap(),
            Consumption::Allowed { remaining: 19 }
        );
    }

    #[tokio::test]
    async fn test_state_is_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.db");
        let pool_a = crate::storage::init_db_pool_with_path(&path).await.unwrap();
        crate::storage::run_migrations(&pool_a).await.unwrap();
        let pool_b = crate::storage::init_db_pool_with_path(&path).await.unwrap();

        let a = SqliteRateLimiter::new(pool_a, policy());
        let b = SqliteRateLimiter::new(pool_b, policy());
        for _ in 0..10 {
            a.consume_at("u1", 1, 0).await.unwrap();
        }
        for _ in 0..10 {
            assert!(!b.consume_at("u1", 1, 0).await.unwrap().is_throttled());
        }
        assert!(a.consume_at("u1", 1, 0).await.unwrap().is_throttled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumes_on_shared_file_never_exceed_quota() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::storage::init_db_pool_with_path(&dir.path().join("limits.db"))
            .await
            .unwrap();
        crate::storage::run_migrations(&pool).await.unwrap();
        let limiter = Arc::new(SqliteRateLimiter::new(pool, policy()));

        let mut handles = Vec::new();
        for i in 0..80 {
            let limiter = Arc::clone(&limiter);
            let key = if i % 4 == 0 { "u2" } else { "u1" };
            handles.push(tokio::spawn(async move {
                (key, limiter.consume_at(key, 1, 1_000).await)
            }));
        }

        // 60 consumes for u1, 20 for u2, all inside one window
        let (mut allowed_u1, mut throttled_u1) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                ("u1", Ok(decision)) if decision.is_throttled() => throttled_u1 += 1,
                ("u1", Ok(_)) => allowed_u1 += 1,
                (_, Ok(decision)) => assert!(!decision.is_throttled()),
                (key, Err(e)) => panic!("consume for {key} failed: {e}"),
            }
        }
        assert_eq!(allowed_u1, 20);
        assert_eq!(throttled_u1, 40);
        assert!(limiter.consume_at("u2", 1, 1_000).await.unwrap().is_throttled());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let pool = create_test_pool().await;
        let limiter = SqliteRateLimiter::new(pool.clone(), policy());
        pool.close().await;
        assert!(matches!(
            limiter.consume("u1", 1).await,
            Err(RateLimitError::Storage(_))
        ));
    }
}
