//! SQLite-backed registration store shared across workers and processes.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{Client, ClientRegistry};
use crate::error_handling::DatabaseError;
use crate::storage::now_ms;

/// Registry stored in the `clients` table.
#[derive(Clone)]
pub struct SqliteClientRegistry {
    pool: SqlitePool,
}

impl SqliteClientRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRegistry for SqliteClientRegistry {
    async fn exists(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM clients WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, client: &Client) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO clients (user_id, username, registered_at_ms) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(&client.user_id)
        .bind(&client.username)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn username(&self, user_id: &str) -> Result<Option<String>, DatabaseError> {
        let username = sqlx::query_scalar("SELECT username FROM clients WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(username)
    }
}
