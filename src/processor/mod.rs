//! Queue consumer that executes task bodies.
//!
//! The task body writes a [`CompletionRecord`] to a [`CompletionSink`]. A
//! failing body is logged and counted, and the item is acknowledged anyway:
//! there is no automatic retry, and one bad item never stops the loop.

mod sink;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::QUEUE_NAME;
use crate::error_handling::{ErrorType, InfoType, ProcessingStats, QueueError};
use crate::queue::{Delivery, TaskQueue};

pub use sink::{CompletionSink, FileCompletionSink};

/// Proof that a task ran for `user_id` at `completed_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    pub fn now(user_id: impl Into<String>) -> Self {
        CompletionRecord {
            user_id: user_id.into(),
            completed_at: Utc::now(),
        }
    }

    /// `<user_id> - task completed at - <ISO 8601, millisecond precision>` plus newline.
    pub fn to_log_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for CompletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - task completed at - {}",
            self.user_id,
            self.completed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Outcome of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed,
    /// The body failed; the item was acknowledged and dropped.
    Failed,
}

/// One consumer of the shared queue.
pub struct TaskProcessor {
    worker_id: usize,
    queue: Arc<dyn TaskQueue>,
    sink: Arc<dyn CompletionSink>,
    stats: Arc<ProcessingStats>,
}

impl TaskProcessor {
    pub fn new(
        worker_id: usize,
        queue: Arc<dyn TaskQueue>,
        sink: Arc<dyn CompletionSink>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        TaskProcessor {
            worker_id,
            queue,
            sink,
            stats,
        }
    }

    /// Drains the queue until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation. Returns an error only when the queue
    /// itself fails; item-level failures are absorbed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), QueueError> {
        debug!("Worker {} started", self.worker_id);
        loop {
            match self.queue.dequeue(&cancel).await {
                Ok(Some(delivery)) => {
                    self.process(&delivery).await;
                }
                Ok(None) => break,
                Err(QueueError::CorruptItem { id, reason }) => {
                    error!("Queue {QUEUE_NAME}: dropped unreadable item {id}: {reason}");
                    self.stats.increment_error(ErrorType::DequeueError);
                }
                Err(e) => {
                    error!("Queue {QUEUE_NAME}: worker {} failed to dequeue: {e}", self.worker_id);
                    self.stats.increment_error(ErrorType::DequeueError);
                    return Err(e);
                }
            }
        }
        debug!("Worker {} stopped", self.worker_id);
        Ok(())
    }

    /// Runs the task body for one delivery and acknowledges it.
    pub async fn process(&self, delivery: &Delivery) -> ItemOutcome {
        if delivery.attempts > 1 {
            warn!(
                "Item {} for {} is being delivered again (attempt {})",
                delivery.id, delivery.item.user_id, delivery.attempts
            );
        }

        let record = CompletionRecord::now(delivery.item.user_id.as_str());
        let outcome = match self.sink.append(&record).await {
            Ok(()) => {
                info!("{record}");
                self.stats.increment_info(InfoType::TaskProcessed);
                ItemOutcome::Completed
            }
            Err(e) => {
                error!("Error processing task {}: {e}", delivery.id);
                self.stats.increment_error(ErrorType::SinkWriteError);
                ItemOutcome::Failed
            }
        };

        if let Err(e) = self.queue.ack(delivery).await {
            // Item stays leased and will be redelivered once the lease lapses
            warn!("Queue {QUEUE_NAME}: failed to acknowledge item {}: {e}", delivery.id);
            self.stats.increment_error(ErrorType::DequeueError);
        }
        outcome
    }
}
