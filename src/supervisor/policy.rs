//! Restart and backoff policies for supervised workers.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use rand::Rng;

use crate::config::{
    RESTART_BACKOFF_FACTOR, RESTART_BACKOFF_FIRST, RESTART_BACKOFF_MAX, WORKER_STABLE_AFTER,
};

/// When a worker that has exited is started again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum RestartPolicy {
    /// Never restart
    Never,
    /// Restart only after an error or a panic (default)
    #[default]
    OnFailure,
    /// Restart after any exit that was not a shutdown
    Always,
}

/// Delay before restart attempt `n`: `first * factor^n`, capped at `max`.
///
/// With `jitter` the delay is drawn uniformly from `[delay / 2, delay]` so
/// workers that crashed together do not restart in lockstep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub first: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            first: RESTART_BACKOFF_FIRST,
            max: RESTART_BACKOFF_MAX,
            factor: RESTART_BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        if !self.jitter || base.is_zero() {
            return base;
        }
        let millis = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(millis / 2..=millis))
    }
}

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Returned `Ok` without being asked to stop.
    Completed,
    Failed(String),
    Panicked(String),
}

impl WorkerExit {
    pub fn is_failure(&self) -> bool {
        !matches!(self, WorkerExit::Completed)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Completed => write!(f, "completed"),
            WorkerExit::Failed(reason) => write!(f, "failed: {reason}"),
            WorkerExit::Panicked(reason) => write!(f, "panicked: {reason}"),
        }
    }
}

/// What the supervisor does after an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart { attempt: u32, delay: Duration },
    Stop,
    GiveUp,
}

/// Per-worker restart bookkeeping.
///
/// The budget counts consecutive short-lived runs. A run that lasted at
/// least `stable_after` starts the count and the backoff over.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    backoff: BackoffPolicy,
    /// 0 means unlimited.
    max_restarts: u32,
    stable_after: Duration,
    restarts: u32,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy, backoff: BackoffPolicy, max_restarts: u32) -> Self {
        RestartTracker {
            policy,
            backoff,
            max_restarts,
            stable_after: WORKER_STABLE_AFTER,
            restarts: 0,
        }
    }

    pub fn with_stable_after(mut self, stable_after: Duration) -> Self {
        self.stable_after = stable_after;
        self
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Decides what follows a run that ended with `exit` after `ran_for`.
    pub fn on_exit(&mut self, exit: &WorkerExit, ran_for: Duration) -> RestartDecision {
        if ran_for >= self.stable_after {
            self.restarts = 0;
        }
        let wants_restart = match self.policy {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure => exit.is_failure(),
            RestartPolicy::Always => true,
        };
        if !wants_restart {
            return RestartDecision::Stop;
        }
        if self.max_restarts > 0 && self.restarts >= self.max_restarts {
            return RestartDecision::GiveUp;
        }
        let attempt = self.restarts;
        self.restarts += 1;
        RestartDecision::Restart {
            attempt,
            delay: self.backoff.next(attempt),
        }
    }
}
