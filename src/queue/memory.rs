//! In-process queue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::{new_claim_token, Delivery, TaskItem, TaskQueue};
use crate::error_handling::QueueError;

#[derive(Default)]
struct Slots {
    ready: VecDeque<(i64, TaskItem, u32)>,
    in_flight: HashMap<i64, (TaskItem, u32, String)>,
}

/// Non-durable queue for tests and single-process runs.
///
/// Claimed items stay in flight until acknowledged; [`MemoryTaskQueue::requeue_in_flight`]
/// puts them back, which is what a restarted consumer would see with a
/// durable broker.
#[derive(Default)]
pub struct MemoryTaskQueue {
    slots: Mutex<Slots>,
    notify: Notify,
    next_id: AtomicI64,
    closed: AtomicBool,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects all further enqueues, as an unreachable broker would.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Returns every unacknowledged claim to the front of the queue.
    pub async fn requeue_in_flight(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let mut returned: Vec<_> = slots
            .in_flight
            .drain()
            .map(|(id, (item, attempts, _))| (id, item, attempts))
            .collect();
        returned.sort_by_key(|(id, _, _)| std::cmp::Reverse(*id));
        let count = returned.len();
        for entry in returned {
            slots.ready.push_front(entry);
        }
        drop(slots);
        if count > 0 {
            self.notify.notify_waiters();
        }
        count
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, item: &TaskItem) -> Result<i64, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("queue is closed".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.slots.lock().await.ready.push_back((id, item.clone(), 0));
        self.notify.notify_one();
        Ok(id)
    }

    async fn try_dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let mut slots = self.slots.lock().await;
        let Some((id, item, attempts)) = slots.ready.pop_front() else {
            return Ok(None);
        };
        let attempts = attempts + 1;
        let claim_token = new_claim_token();
        slots
            .in_flight
            .insert(id, (item.clone(), attempts, claim_token.clone()));
        Ok(Some(Delivery {
            id,
            item,
            attempts,
            claim_token,
        }))
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, QueueError> {
        loop {
            // Register interest before checking so an enqueue in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_dequeue().await? {
                return Ok(Some(delivery));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = &mut notified => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut slots = self.slots.lock().await;
        let owned = matches!(
            slots.in_flight.get(&delivery.id),
            Some((_, _, token)) if *token == delivery.claim_token
        );
        if owned {
            slots.in_flight.remove(&delivery.id);
        }
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let slots = self.slots.lock().await;
        Ok((slots.ready.len() + slots.in_flight.len()) as u64)
    }
}
