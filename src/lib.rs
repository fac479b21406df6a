//! task_intake library: rate-limited task admission over a durable queue
//!
//! Registered clients submit tasks over HTTP. Each submission is charged
//! against a per-client quota and placed in a SQLite-backed work queue; a
//! supervised pool of workers drains the queue and appends a completion
//! record per task to a log file.
//!
//! # Example
//!
//! ```no_run
//! use task_intake::{Config, run_service};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     port: 8080,
//!     workers: 4,
//!     ..Default::default()
//! };
//!
//! let report = run_service(config).await?;
//! println!("Processed {} tasks", report.processed);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

pub mod admission;
pub mod api;
mod app;
pub mod config;
mod error_handling;
pub mod initialization;
pub mod processor;
pub mod queue;
pub mod rate_limiter;
pub mod registry;
mod storage;
pub mod supervisor;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel, StateBackend};
pub use error_handling::{
    AdmissionError, DatabaseError, ErrorType, InfoType, InitializationError, ProcessingStats,
    QueueError, RateLimitError, RegistrationError, SinkError,
};
pub use run::{run_service, run_service_with_listener, ServiceReport};
pub use storage::{init_memory_pool, run_migrations};

// Service runner (wires every component together)
mod run {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::{bail, Context, Result};
    use futures::FutureExt;
    use log::{error, info};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use crate::admission::AdmissionController;
    use crate::api::{self, ApiState};
    use crate::app::{
        log_progress, print_statistics, shutdown_gracefully, wait_for_shutdown_signal,
    };
    use crate::config::{Config, LOGGING_INTERVAL_SECS};
    use crate::error_handling::InfoType;
    use crate::initialization::{
        init_client_registry, init_db_pool_with_path, init_rate_limiter, init_stats,
    };
    use crate::processor::{CompletionSink, FileCompletionSink, TaskProcessor};
    use crate::queue::{SqliteTaskQueue, TaskQueue};
    use crate::storage::run_migrations;
    use crate::supervisor::{Supervisor, SupervisorPolicy, WorkerFactory};

    /// Counters reported when the service stops.
    #[derive(Debug, Clone)]
    pub struct ServiceReport {
        pub accepted: usize,
        pub throttled: usize,
        pub unauthorized: usize,
        pub processed: usize,
        pub errors: usize,
        pub elapsed_seconds: f64,
    }

    /// Runs the service on the configured address until Ctrl-C or SIGTERM.
    pub async fn run_service(config: Config) -> Result<ServiceReport> {
        let addr = format!("{}:{}", config.bind, config.port);
        let listener = api::bind(&addr).await?;

        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => info!("Shutdown signal received, draining"),
                Err(e) => error!("Failed to listen for shutdown signals: {e}"),
            }
            signal_cancel.cancel();
        });

        run_service_with_listener(config, listener, cancel).await
    }

    /// Runs the service on an already bound listener until `cancel` fires.
    pub async fn run_service_with_listener(
        config: Config,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<ServiceReport> {
        let start_time = Instant::now();

        let pool = init_db_pool_with_path(&config.db_path)
            .await
            .context("Failed to initialize database pool")?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let stats = init_stats();
        let registry = init_client_registry(config.state, &pool);
        let limiter = init_rate_limiter(&config, &pool);
        let queue: Arc<dyn TaskQueue> = Arc::new(
            SqliteTaskQueue::new(pool.clone())
                .with_visibility_timeout(config.visibility_timeout())
                .with_poll_interval(config.queue_poll_interval()),
        );
        let sink: Arc<dyn CompletionSink> = Arc::new(FileCompletionSink::new(&config.task_log));
        info!(
            "Queue broker {}, completion log {}",
            config.db_path.display(),
            config.task_log.display()
        );

        let admission = AdmissionController::new(
            registry,
            limiter,
            Arc::clone(&queue),
            Arc::clone(&stats),
        );

        let supervisor = Supervisor::new(
            SupervisorPolicy {
                restart: config.restart_policy,
                max_restarts: config.max_restarts,
                ..SupervisorPolicy::default()
            },
            Arc::clone(&stats),
        );
        let factory: WorkerFactory = {
            let queue = Arc::clone(&queue);
            let sink = Arc::clone(&sink);
            let stats = Arc::clone(&stats);
            Arc::new(move |id: usize, cancel: CancellationToken| {
                let processor =
                    TaskProcessor::new(id, Arc::clone(&queue), Arc::clone(&sink), Arc::clone(&stats));
                async move { processor.run(cancel).await }.boxed()
            })
        };
        let workers = supervisor
            .start(config.worker_count(), factory, cancel.child_token())
            .await;
        let workers = supervisor.cancel_when_exhausted(workers, cancel.clone());

        let cancel_logging = cancel.child_token();
        let logging_stats = Arc::clone(&stats);
        let logging_queue = Arc::clone(&queue);
        let logging_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(LOGGING_INTERVAL_SECS));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let depth = logging_queue.depth().await.ok();
                        log_progress(start_time, &logging_stats, depth);
                    }
                    _ = cancel_logging.cancelled() => {
                        break;
                    }
                }
            }
        });

        let state = ApiState::new(admission, Some(Arc::clone(&supervisor)));
        let served = api::serve(listener, state, cancel.clone()).await;
        if let Err(ref e) = served {
            error!("{e:#}");
        }

        shutdown_gracefully(cancel, Some(logging_task), Some(workers)).await;
        log_progress(start_time, &stats, queue.depth().await.ok());
        print_statistics(&stats);
        pool.close().await;
        served?;
        if supervisor.all_gave_up().await {
            bail!("every queue worker gave up; the queue is no longer drained");
        }

        Ok(ServiceReport {
            accepted: stats.get_info_count(InfoType::SubmissionAccepted),
            throttled: stats.get_info_count(InfoType::SubmissionThrottled),
            unauthorized: stats.get_info_count(InfoType::SubmissionUnauthorized),
            processed: stats.get_info_count(InfoType::TaskProcessed),
            errors: stats.total_errors(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }
}
