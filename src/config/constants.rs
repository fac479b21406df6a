//! Configuration constants.
//!
//! This module defines the defaults used throughout the application: the
//! listening port, the rate-limit quota and window, queue timings and the
//! paths of the durable files.

use std::time::Duration;

/// Default HTTP listening port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default bind address for the HTTP listener.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default SQLite database path (the queue broker, registry and limiter state).
pub const DB_PATH: &str = "./task_intake.db";
/// Default completion log path.
pub const TASK_LOG_PATH: &str = "task.log";
/// Name of the work queue. Rows in `task_queue` are keyed by this name.
pub const QUEUE_NAME: &str = "taskQueue";

// Rate limiting
/// Points each client may consume per window (20 tasks per minute)
pub const RATE_LIMIT_POINTS: u32 = 20;
/// Length of the quota window in seconds
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Extra blocking applied after a key exceeds its quota.
/// Zero means throttling is advisory only: no enforcement delay.
pub const RATE_LIMIT_BLOCK_SECS: u64 = 0;
/// Points consumed by one task submission
pub const POINTS_PER_SUBMISSION: u32 = 1;

// Queue timings
/// How often an idle consumer re-checks the durable queue for work.
/// In-process enqueues wake consumers immediately; polling covers
/// enqueues made by other processes sharing the same database.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a claimed item stays invisible to other consumers.
/// If it is not acknowledged within this period it is delivered again.
pub const VISIBILITY_TIMEOUT_SECS: u64 = 30;

// Supervisor
/// Default number of restarts allowed per worker before giving up (0 = unlimited)
pub const MAX_WORKER_RESTARTS: u32 = 10;
/// First restart delay for a crashed worker
pub const RESTART_BACKOFF_FIRST: Duration = Duration::from_millis(100);
/// Upper bound for the restart delay
pub const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(30);
/// Growth factor between consecutive restart delays
pub const RESTART_BACKOFF_FACTOR: f64 = 2.0;
/// A worker run lasting at least this long clears its restart count and
/// backoff, so only failures close together exhaust the restart budget
pub const WORKER_STABLE_AFTER: Duration = RESTART_BACKOFF_MAX;

// Progress logging
/// Interval between progress log lines, in seconds
pub const LOGGING_INTERVAL_SECS: u64 = 30;
