// storage/migrations.rs
// Database migration management

use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};

use crate::error_handling::DatabaseError;

/// Schema migrations, compiled into the binary from `migrations/`.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies any migration the database has not seen yet.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_memory_pool;

    #[tokio::test]
    async fn test_migrations_create_schema_and_are_idempotent() {
        let pool = init_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name IN ('clients', 'rate_limits', 'task_queue') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, ["clients", "rate_limits", "task_queue"]);
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().next().is_some());
    }
}
