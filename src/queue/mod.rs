//! Work queue decoupling task submission from execution.
//!
//! Items are claimed, processed and then acknowledged. A claimed item that
//! is never acknowledged (its consumer died, or the lease ran out) becomes
//! visible again, so delivery is at-least-once.
//!
//! Backends:
//! - [`SqliteTaskQueue`]: durable; items survive restarts of the producing
//!   process and can be shared by several processes using one database file
//! - [`MemoryTaskQueue`]: in-process only. Items are lost when the process
//!   exits, which changes the failure semantics; use it for tests and
//!   throwaway runs

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error_handling::QueueError;

pub use memory::MemoryTaskQueue;
pub use sqlite::SqliteTaskQueue;

/// Payload of one queued task.
///
/// References a client by `user_id`; the queue does not own the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub user_id: String,
}

impl TaskItem {
    pub fn new(user_id: impl Into<String>) -> Self {
        TaskItem {
            user_id: user_id.into(),
        }
    }
}

/// A claimed item. Hand it back to [`TaskQueue::ack`] once handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: i64,
    pub item: TaskItem,
    /// Number of times the item has been claimed, including this one.
    pub attempts: u32,
    pub(crate) claim_token: String,
}

/// Queue contract shared by producers (admission) and consumers (workers).
///
/// Every method must be safe to call concurrently from many tasks.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Appends `item`, returning its queue id.
    ///
    /// # Errors
    ///
    /// Fails when the broker cannot store the item. The item is then not
    /// in the queue.
    async fn enqueue(&self, item: &TaskItem) -> Result<i64, QueueError>;

    /// Claims the oldest visible item without waiting.
    async fn try_dequeue(&self) -> Result<Option<Delivery>, QueueError>;

    /// Waits until an item can be claimed.
    ///
    /// Returns `Ok(None)` only when `cancel` fires first.
    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError>;

    /// Removes a handled item from the queue.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Number of items stored (waiting or claimed but not acknowledged).
    async fn depth(&self) -> Result<u64, QueueError>;
}

pub(crate) fn new_claim_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}
