//! JSON status handler.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use strum::IntoEnumIterator;

use super::super::types::{ApiState, ErrorCounts, StatusResponse, SubmissionCounts};
use crate::error_handling::{ErrorType, InfoType};

/// JSON status endpoint with counters, queue depth and worker states
pub async fn status_handler(State(state): State<ApiState>) -> Response {
    let stats = &state.stats;

    // A failing broker still gets a status page, just without the depth
    let queue_depth = match state.admission.queue().depth().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            log::warn!("Failed to read queue depth: {e}");
            None
        }
    };

    let workers = match &state.supervisor {
        Some(supervisor) => supervisor.snapshot().await,
        None => Vec::new(),
    };

    let by_type: BTreeMap<&'static str, usize> = ErrorType::iter()
        .map(|e| (e.key(), stats.get_error_count(e)))
        .collect();

    let response = StatusResponse {
        uptime_seconds: state.start_time.elapsed().as_secs_f64(),
        queue_depth,
        submissions: SubmissionCounts {
            accepted: stats.get_info_count(InfoType::SubmissionAccepted),
            throttled: stats.get_info_count(InfoType::SubmissionThrottled),
            unauthorized: stats.get_info_count(InfoType::SubmissionUnauthorized),
        },
        tasks_processed: stats.get_info_count(InfoType::TaskProcessed),
        clients_registered: stats.get_info_count(InfoType::ClientRegistered),
        errors: ErrorCounts {
            total: stats.total_errors(),
            by_type,
        },
        workers,
    };

    (StatusCode::OK, Json(response)).into_response()
}
