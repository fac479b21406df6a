//! Prometheus metrics handler.

use std::fmt::Write;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use strum::IntoEnumIterator;

use super::super::types::ApiState;
use crate::error_handling::{ErrorType, InfoType};
use crate::supervisor::WorkerState;

/// Prometheus-compatible metrics endpoint
pub async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let stats = &state.stats;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "# HELP task_intake_uptime_seconds Seconds since the service started\n\
         # TYPE task_intake_uptime_seconds gauge\n\
         task_intake_uptime_seconds {}\n",
        state.start_time.elapsed().as_secs_f64()
    );

    if let Ok(depth) = state.admission.queue().depth().await {
        let _ = writeln!(
            out,
            "# HELP task_intake_queue_depth Items waiting or in flight in the work queue\n\
             # TYPE task_intake_queue_depth gauge\n\
             task_intake_queue_depth {depth}\n"
        );
    }

    let _ = writeln!(
        out,
        "# HELP task_intake_events_total Submission and processing events by kind\n\
         # TYPE task_intake_events_total counter"
    );
    for info in InfoType::iter() {
        let _ = writeln!(
            out,
            "task_intake_events_total{{kind=\"{}\"}} {}",
            info.key(),
            stats.get_info_count(info)
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "# HELP task_intake_errors_total Errors encountered by category\n\
         # TYPE task_intake_errors_total counter"
    );
    for error in ErrorType::iter() {
        let _ = writeln!(
            out,
            "task_intake_errors_total{{category=\"{}\"}} {}",
            error.key(),
            stats.get_error_count(error)
        );
    }

    if let Some(supervisor) = &state.supervisor {
        let workers = supervisor.snapshot().await;
        let running = workers
            .iter()
            .filter(|w| w.state == WorkerState::Running)
            .count();
        let gave_up = workers
            .iter()
            .filter(|w| w.state == WorkerState::GaveUp)
            .count();
        let restarts = stats.get_info_count(InfoType::WorkerRestart);
        let _ = writeln!(
            out,
            "\n# HELP task_intake_workers_running Queue workers currently running\n\
             # TYPE task_intake_workers_running gauge\n\
             task_intake_workers_running {running}\n\n\
             # HELP task_intake_workers_gave_up Queue workers that exhausted their restart budget\n\
             # TYPE task_intake_workers_gave_up gauge\n\
             task_intake_workers_gave_up {gave_up}\n\n\
             # HELP task_intake_worker_restarts_total Worker restarts since start\n\
             # TYPE task_intake_worker_restarts_total counter\n\
             task_intake_worker_restarts_total {restarts}"
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        out,
    )
        .into_response()
}
