//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::supervisor::RestartPolicy;

use crate::config::constants::{
    DB_PATH, DEFAULT_BIND, DEFAULT_PORT, MAX_WORKER_RESTARTS, QUEUE_POLL_INTERVAL,
    RATE_LIMIT_BLOCK_SECS, RATE_LIMIT_POINTS, RATE_LIMIT_WINDOW_SECS, TASK_LOG_PATH,
    VISIBILITY_TIMEOUT_SECS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Where the registration store and rate-limiter counters live.
///
/// `Shared` keeps them in the SQLite database next to the queue, so every
/// worker and every process pointed at the same file sees one registry and
/// one set of quota windows. `Local` keeps them in process memory; a client
/// registered with one process is then invisible to its siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StateBackend {
    /// Registry and limiter in SQLite (default)
    Shared,
    /// Registry and limiter in process memory
    Local,
}

/// Service configuration.
///
/// Parsed from the command line (with `TASK_INTAKE_*` environment fallbacks)
/// by the binary, or constructed programmatically by library users.
///
/// # Examples
///
/// ```no_run
/// use task_intake::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     db_path: PathBuf::from("/var/lib/task_intake/queue.db"),
///     port: 8080,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "task_intake",
    about = "Admits rate-limited task submissions into a durable queue and processes them"
)]
pub struct Config {
    /// HTTP listening port
    #[arg(long, env = "TASK_INTAKE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// HTTP bind address
    #[arg(long, env = "TASK_INTAKE_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// SQLite database path (queue broker, and shared registry/limiter state)
    #[arg(long, env = "TASK_INTAKE_DB_PATH", default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Append-only completion log
    #[arg(long, env = "TASK_INTAKE_TASK_LOG", default_value = TASK_LOG_PATH)]
    pub task_log: PathBuf,

    /// Points each client may consume per window
    #[arg(long, env = "TASK_INTAKE_RATE_LIMIT_POINTS", default_value_t = RATE_LIMIT_POINTS)]
    pub rate_limit_points: u32,

    /// Quota window length in seconds
    #[arg(long, env = "TASK_INTAKE_RATE_LIMIT_WINDOW_SECS", default_value_t = RATE_LIMIT_WINDOW_SECS)]
    pub rate_limit_window_secs: u64,

    /// Seconds a client stays throttled after exceeding its quota (0 = advisory only)
    #[arg(long, env = "TASK_INTAKE_RATE_LIMIT_BLOCK_SECS", default_value_t = RATE_LIMIT_BLOCK_SECS)]
    pub rate_limit_block_secs: u64,

    /// Number of queue workers (0 = one per available CPU)
    #[arg(long, env = "TASK_INTAKE_WORKERS", default_value_t = 0)]
    pub workers: usize,

    /// Restarts allowed per worker before it is abandoned (0 = unlimited)
    #[arg(long, env = "TASK_INTAKE_MAX_RESTARTS", default_value_t = MAX_WORKER_RESTARTS)]
    pub max_restarts: u32,

    /// When a stopped worker is started again
    #[arg(long, env = "TASK_INTAKE_RESTART_POLICY", value_enum, default_value_t = RestartPolicy::OnFailure)]
    pub restart_policy: RestartPolicy,

    /// Idle poll interval for the durable queue, in milliseconds
    #[arg(long, env = "TASK_INTAKE_QUEUE_POLL_MS", default_value_t = QUEUE_POLL_INTERVAL.as_millis() as u64)]
    pub queue_poll_ms: u64,

    /// Seconds a claimed item stays invisible before it is redelivered
    #[arg(long, env = "TASK_INTAKE_VISIBILITY_TIMEOUT_SECS", default_value_t = VISIBILITY_TIMEOUT_SECS)]
    pub visibility_timeout_secs: u64,

    /// Where the registry and limiter state live
    #[arg(long, env = "TASK_INTAKE_STATE", value_enum, default_value_t = StateBackend::Shared)]
    pub state: StateBackend,

    /// Log level
    #[arg(long, env = "TASK_INTAKE_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, env = "TASK_INTAKE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Config {
    /// Number of workers to launch, resolving `0` to the available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_block(&self) -> Duration {
        Duration::from_secs(self.rate_limit_block_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms.max(1))
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            db_path: PathBuf::from(DB_PATH),
            task_log: PathBuf::from(TASK_LOG_PATH),
            rate_limit_points: RATE_LIMIT_POINTS,
            rate_limit_window_secs: RATE_LIMIT_WINDOW_SECS,
            rate_limit_block_secs: RATE_LIMIT_BLOCK_SECS,
            workers: 0,
            max_restarts: MAX_WORKER_RESTARTS,
            restart_policy: RestartPolicy::OnFailure,
            queue_poll_ms: QUEUE_POLL_INTERVAL.as_millis() as u64,
            visibility_timeout_secs: VISIBILITY_TIMEOUT_SECS,
            state: StateBackend::Shared,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}
