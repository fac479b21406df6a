//! Durable queue stored in the `task_queue` table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{new_claim_token, Delivery, TaskItem, TaskQueue};
use crate::config::{QUEUE_NAME, QUEUE_POLL_INTERVAL, VISIBILITY_TIMEOUT_SECS};
use crate::error_handling::QueueError;
use crate::rate_limiter::window::duration_ms;
use crate::storage::now_ms;

/// SQLite-backed FIFO queue with leased claims.
///
/// Claiming is a single `UPDATE ... RETURNING` statement, so two consumers
/// never claim the same visible row. Enqueues from this process wake a
/// waiting consumer immediately; enqueues from other processes are picked
/// up on the next poll.
#[derive(Clone)]
pub struct SqliteTaskQueue {
    pool: SqlitePool,
    name: String,
    visibility_timeout: Duration,
    poll_interval: Duration,
    notify: Arc<Notify>,
}

impl SqliteTaskQueue {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTaskQueue {
            pool,
            name: QUEUE_NAME.to_string(),
            visibility_timeout: Duration::from_secs(VISIBILITY_TIMEOUT_SECS),
            poll_interval: QUEUE_POLL_INTERVAL,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn enqueue(&self, item: &TaskItem) -> Result<i64, QueueError> {
        let payload =
            serde_json::to_string(item).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let now = now_ms();
        let result = sqlx::query(
            "INSERT INTO task_queue (queue, payload, attempts, enqueued_at_ms, visible_at_ms)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(&self.name)
        .bind(payload)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.notify.notify_one();
        Ok(result.last_insert_rowid())
    }

    async fn try_dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_ms();
        let token = new_claim_token();
        let row = sqlx::query(
            "UPDATE task_queue
             SET visible_at_ms = ?, attempts = attempts + 1, claimed_by = ?
             WHERE id = (
                 SELECT id FROM task_queue
                 WHERE queue = ? AND visible_at_ms <= ?
                 ORDER BY id
                 LIMIT 1
             )
             RETURNING id, payload, attempts",
        )
        .bind(now.saturating_add(duration_ms(self.visibility_timeout)))
        .bind(&token)
        .bind(&self.name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let payload: String = row.try_get("payload")?;
        let attempts: i64 = row.try_get("attempts")?;
        let item: TaskItem = match serde_json::from_str(&payload) {
            Ok(item) => item,
            Err(e) => {
                // An unreadable payload can never succeed; drop it instead of redelivering forever
                sqlx::query("DELETE FROM task_queue WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                return Err(QueueError::CorruptItem {
                    id,
                    reason: e.to_string(),
                });
            }
        };

        Ok(Some(Delivery {
            id,
            item,
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            claim_token: token,
        }))
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(delivery) = self.try_dequeue().await? {
                return Ok(Some(delivery));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM task_queue WHERE id = ? AND claimed_by = ?")
            .bind(delivery.id)
            .bind(&delivery.claim_token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            // Lease expired and another consumer re-claimed the item
            log::warn!(
                "Queue {}: item {} was re-claimed before it was acknowledged",
                self.name,
                delivery.id
            );
        }
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_queue WHERE queue = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
