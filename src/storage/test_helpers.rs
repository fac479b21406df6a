//! Shared test helpers for storage-backed module tests.

#[cfg(test)]
use sqlx::SqlitePool;

#[cfg(test)]
use crate::storage::{init_memory_pool, run_migrations};

/// Creates a test database pool with migrations applied.
/// Uses an in-memory database for fast test execution.
#[cfg(test)]
pub async fn create_test_pool() -> SqlitePool {
    let pool = init_memory_pool()
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Counts rows currently stored in the work queue.
#[cfg(test)]
pub async fn count_queue_rows(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM task_queue")
        .fetch_one(pool)
        .await
        .expect("Failed to count queue rows")
}
