//! Worker supervision.
//!
//! Runs a fixed number of queue workers as tokio tasks. When a worker exits
//! for any reason other than shutdown, its [`RestartTracker`] decides
//! whether it is started again (after a backoff delay) or abandoned. Each
//! worker's [`WorkerState`] and restart count can be read at any time.
//!
//! A pool in which every worker has given up no longer drains the queue;
//! [`Supervisor::cancel_when_exhausted`] turns that into a service shutdown.

mod policy;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{MAX_WORKER_RESTARTS, WORKER_STABLE_AFTER};
use crate::error_handling::{ErrorType, InfoType, ProcessingStats, QueueError};

pub use policy::{
    BackoffPolicy, RestartDecision, RestartPolicy, RestartTracker, WorkerExit,
};

/// Lifecycle of one supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    /// Waiting to start restart number `attempt + 1`.
    Backoff { attempt: u32 },
    Stopped,
    /// Exceeded its restart budget; will not run again.
    GaveUp,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running => write!(f, "running"),
            WorkerState::Backoff { attempt } => write!(f, "backoff (attempt {})", attempt + 1),
            WorkerState::Stopped => write!(f, "stopped"),
            WorkerState::GaveUp => write!(f, "gave up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub id: usize,
    #[serde(flatten)]
    pub state: WorkerState,
    /// Restarts since the last run that lasted long enough to count as stable.
    pub restarts: u32,
}

/// Starts one run of worker `id`. Called again on every restart.
pub type WorkerFactory =
    Arc<dyn Fn(usize, CancellationToken) -> BoxFuture<'static, Result<(), QueueError>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    pub restart: RestartPolicy,
    pub backoff: BackoffPolicy,
    /// Consecutive restarts allowed per worker; 0 means unlimited.
    pub max_restarts: u32,
    /// Run length after which a worker's restart count is cleared.
    pub stable_after: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        SupervisorPolicy {
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            max_restarts: MAX_WORKER_RESTARTS,
            stable_after: WORKER_STABLE_AFTER,
        }
    }
}

pub struct Supervisor {
    policy: SupervisorPolicy,
    stats: Arc<ProcessingStats>,
    workers: RwLock<Vec<WorkerStatus>>,
}

impl Supervisor {
    pub fn new(policy: SupervisorPolicy, stats: Arc<ProcessingStats>) -> Arc<Self> {
        Arc::new(Supervisor {
            policy,
            stats,
            workers: RwLock::new(Vec::new()),
        })
    }

    /// Launches `count` workers and returns a handle that resolves once all
    /// of them have stopped or given up.
    pub async fn start(
        self: &Arc<Self>,
        count: usize,
        factory: WorkerFactory,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        {
            let mut workers = self.workers.write().await;
            *workers = (0..count)
                .map(|id| WorkerStatus {
                    id,
                    state: WorkerState::Running,
                    restarts: 0,
                })
                .collect();
        }
        info!("Starting {count} queue worker(s)");

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let runs = (0..count).map(|id| {
                let supervisor = Arc::clone(&supervisor);
                let factory = Arc::clone(&factory);
                let cancel = cancel.clone();
                async move { supervisor.supervise(id, factory, cancel).await }
            });
            join_all(runs).await;
            info!("All queue workers stopped");
        })
    }

    pub async fn snapshot(&self) -> Vec<WorkerStatus> {
        self.workers.read().await.clone()
    }

    /// True when at least one worker was started and every one gave up.
    pub async fn all_gave_up(&self) -> bool {
        let workers = self.workers.read().await;
        !workers.is_empty() && workers.iter().all(|w| w.state == WorkerState::GaveUp)
    }

    /// Waits for the worker pool started by [`Supervisor::start`] and
    /// cancels `service` if it ended because every worker gave up.
    pub fn cancel_when_exhausted(
        self: &Arc<Self>,
        workers: JoinHandle<()>,
        service: CancellationToken,
    ) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = workers.await {
                warn!("Worker supervisor ended abnormally: {e}");
            }
            if !service.is_cancelled() && supervisor.all_gave_up().await {
                error!("Every queue worker gave up, shutting down");
                service.cancel();
            }
        })
    }

    async fn set_state(&self, id: usize, state: WorkerState, restarts: u32) {
        if let Some(status) = self.workers.write().await.get_mut(id) {
            status.state = state;
            status.restarts = restarts;
        }
    }

    async fn supervise(&self, id: usize, factory: WorkerFactory, cancel: CancellationToken) {
        let mut tracker =
            RestartTracker::new(self.policy.restart, self.policy.backoff, self.policy.max_restarts)
                .with_stable_after(self.policy.stable_after);

        loop {
            self.set_state(id, WorkerState::Running, tracker.restarts()).await;
            let started = Instant::now();
            let exit = run_once(tokio::spawn(factory(id, cancel.clone()))).await;
            let ran_for = started.elapsed();

            if cancel.is_cancelled() {
                break;
            }
            if exit.is_failure() {
                error!("Worker {id} {exit}");
                self.stats.increment_error(ErrorType::WorkerCrash);
            } else {
                info!("Worker {id} exited");
            }

            match tracker.on_exit(&exit, ran_for) {
                RestartDecision::Restart { attempt, delay } => {
                    self.set_state(id, WorkerState::Backoff { attempt }, tracker.restarts())
                        .await;
                    warn!(
                        "Restarting worker {id} in {}ms (restart {})",
                        delay.as_millis(),
                        attempt + 1
                    );
                    self.stats.increment_info(InfoType::WorkerRestart);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RestartDecision::Stop => break,
                RestartDecision::GiveUp => {
                    error!(
                        "Worker {id} exceeded {} restarts, giving up",
                        self.policy.max_restarts
                    );
                    self.set_state(id, WorkerState::GaveUp, tracker.restarts()).await;
                    return;
                }
            }
        }
        self.set_state(id, WorkerState::Stopped, tracker.restarts()).await;
    }
}

async fn run_once(handle: JoinHandle<Result<(), QueueError>>) -> WorkerExit {
    match handle.await {
        Ok(Ok(())) => WorkerExit::Completed,
        Ok(Err(e)) => WorkerExit::Failed(e.to_string()),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WorkerExit::Panicked(reason)
        }
        Err(e) => WorkerExit::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(restart: RestartPolicy, max_restarts: u32) -> SupervisorPolicy {
        SupervisorPolicy {
            restart,
            backoff: BackoffPolicy {
                first: Duration::from_millis(1),
                max: Duration::from_millis(5),
                factor: 2.0,
                jitter: false,
            },
            max_restarts,
            stable_after: Duration::from_secs(60),
        }
    }

    fn always_failing(runs: &Arc<AtomicU32>) -> WorkerFactory {
        let runs = Arc::clone(runs);
        Arc::new(move |_: usize, _: CancellationToken| {
            runs.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(QueueError::Unavailable("broker down".into())) }.boxed()
        })
    }

    #[tokio::test]
    async fn test_failing_worker_gives_up_after_budget() {
        let stats = Arc::new(ProcessingStats::new());
        let supervisor = Supervisor::new(quick_policy(RestartPolicy::OnFailure, 3), stats.clone());
        let runs = Arc::new(AtomicU32::new(0));
        let factory = always_failing(&runs);

        let handle = supervisor.start(1, factory, CancellationToken::new()).await;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 4);
        let status = supervisor.snapshot().await;
        assert_eq!(status[0].state, WorkerState::GaveUp);
        assert_eq!(status[0].restarts, 3);
        assert_eq!(stats.get_info_count(InfoType::WorkerRestart), 3);
        assert_eq!(stats.get_error_count(ErrorType::WorkerCrash), 4);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_restarted() {
        let stats = Arc::new(ProcessingStats::new());
        let supervisor = Supervisor::new(quick_policy(RestartPolicy::OnFailure, 0), stats);
        let runs = Arc::new(AtomicU32::new(0));
        let factory: WorkerFactory = {
            let runs = Arc::clone(&runs);
            Arc::new(move |_: usize, cancel: CancellationToken| {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                async move {
                    if run == 0 {
                        panic!("first run explodes");
                    }
                    cancel.cancelled().await;
                    Ok::<(), QueueError>(())
                }
                .boxed()
            })
        };

        let cancel = CancellationToken::new();
        let handle = supervisor.start(1, factory, cancel.clone()).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(supervisor.snapshot().await[0].restarts, 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(supervisor.snapshot().await[0].state, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_workers_without_restart() {
        let stats = Arc::new(ProcessingStats::new());
        let supervisor = Supervisor::new(quick_policy(RestartPolicy::Always, 0), stats.clone());
        let factory: WorkerFactory = Arc::new(|_: usize, cancel: CancellationToken| {
            async move {
                cancel.cancelled().await;
                Ok::<(), QueueError>(())
            }
            .boxed()
        });

        let cancel = CancellationToken::new();
        let handle = supervisor.start(4, factory, cancel.clone()).await;
        assert_eq!(supervisor.snapshot().await.len(), 4);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(supervisor
            .snapshot()
            .await
            .iter()
            .all(|w| w.state == WorkerState::Stopped && w.restarts == 0));
        assert_eq!(stats.get_info_count(InfoType::WorkerRestart), 0);
    }

    #[tokio::test]
    async fn test_worker_with_healthy_runs_never_gives_up() {
        let stats = Arc::new(ProcessingStats::new());
        let policy = SupervisorPolicy {
            stable_after: Duration::from_millis(20),
            ..quick_policy(RestartPolicy::OnFailure, 2)
        };
        let supervisor = Supervisor::new(policy, stats);
        let runs = Arc::new(AtomicU32::new(0));
        let factory: WorkerFactory = {
            let runs = Arc::clone(&runs);
            Arc::new(move |_: usize, cancel: CancellationToken| {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                async move {
                    if run < 6 {
                        // Healthy for a while, then a transient failure
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        return Err(QueueError::Unavailable("database is locked".into()));
                    }
                    cancel.cancelled().await;
                    Ok::<(), QueueError>(())
                }
                .boxed()
            })
        };

        let cancel = CancellationToken::new();
        let handle = supervisor.start(1, factory, cancel.clone()).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < 7 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let status = supervisor.snapshot().await;
        assert_eq!(status[0].state, WorkerState::Running);
        assert_eq!(status[0].restarts, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_pool_cancels_service() {
        let stats = Arc::new(ProcessingStats::new());
        let supervisor = Supervisor::new(quick_policy(RestartPolicy::OnFailure, 1), stats);
        let runs = Arc::new(AtomicU32::new(0));
        let service = CancellationToken::new();

        let workers = supervisor
            .start(3, always_failing(&runs), service.child_token())
            .await;
        let watcher = supervisor.cancel_when_exhausted(workers, service.clone());
        tokio::time::timeout(Duration::from_secs(5), service.cancelled())
            .await
            .unwrap();
        watcher.await.unwrap();

        assert!(supervisor.all_gave_up().await);
        assert_eq!(runs.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_shutdown_is_not_exhaustion() {
        let stats = Arc::new(ProcessingStats::new());
        let supervisor = Supervisor::new(quick_policy(RestartPolicy::OnFailure, 1), stats);
        let factory: WorkerFactory = Arc::new(|_: usize, cancel: CancellationToken| {
            async move {
                cancel.cancelled().await;
                Ok::<(), QueueError>(())
            }
            .boxed()
        });
        let service = CancellationToken::new();

        let workers = supervisor.start(2, factory, service.child_token()).await;
        let watcher = supervisor.cancel_when_exhausted(workers, service.clone());
        service.cancel();
        watcher.await.unwrap();
        assert!(!supervisor.all_gave_up().await);
    }

    #[test]
    fn test_worker_status_serializes_flat() {
        let status = WorkerStatus {
            id: 2,
            state: WorkerState::Backoff { attempt: 1 },
            restarts: 2,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 2, "state": "backoff", "attempt": 1, "restarts": 2})
        );
    }
}
