//! API data structures.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::admission::AdmissionController;
use crate::error_handling::ProcessingStats;
use crate::supervisor::{Supervisor, WorkerStatus};

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct ApiState {
    pub admission: AdmissionController,
    pub stats: Arc<ProcessingStats>,
    /// Absent when the process only accepts submissions and runs no workers.
    pub supervisor: Option<Arc<Supervisor>>,
    pub start_time: Arc<Instant>,
}

impl ApiState {
    pub fn new(admission: AdmissionController, supervisor: Option<Arc<Supervisor>>) -> Self {
        let stats = Arc::clone(admission.stats());
        ApiState {
            admission,
            stats,
            supervisor,
            start_time: Arc::new(Instant::now()),
        }
    }
}

/// `{"message": "..."}` body used by every API response.
#[derive(Debug, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        MessageBody {
            message: message.into(),
        }
    }
}

/// JSON response for `/status` endpoint
#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<u64>,
    pub submissions: SubmissionCounts,
    pub tasks_processed: usize,
    pub clients_registered: usize,
    pub errors: ErrorCounts,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Serialize)]
pub struct SubmissionCounts {
    pub accepted: usize,
    pub throttled: usize,
    pub unauthorized: usize,
}

#[derive(Serialize)]
pub struct ErrorCounts {
    pub total: usize,
    #[serde(flatten)]
    pub by_type: BTreeMap<&'static str, usize>,
}
