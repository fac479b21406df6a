//! HTTP transport.
//!
//! Endpoints:
//! - `POST /api/v1/register` - register a client
//! - `POST /api/v1/task` - submit a task
//! - `GET /status` - JSON counters, queue depth and worker states
//! - `GET /metrics` - Prometheus-compatible metrics

mod error;
mod handlers;
mod types;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error_handling::InitializationError;
use handlers::{metrics_handler, register_handler, status_handler, task_handler};

pub use types::{ApiState, MessageBody};

/// Response messages shown to clients.
pub mod messages {
    pub const REGISTERED: &str = "User registered successfully.";
    pub const TASK_QUEUED: &str = "Task added to the queue";
    pub const THROTTLED: &str = "Rate limit exceeded. Task queued.";
    pub const NOT_REGISTERED: &str = "User not registered. Please register first.";
    pub const SERVER_ERROR: &str = "An error occurred.";
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/register", post(register_handler))
        .route("/api/v1/task", post(task_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Binds the HTTP listener.
pub async fn bind(addr: &str) -> Result<TcpListener, InitializationError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| InitializationError::ListenerError {
            addr: addr.to_string(),
            source,
        })
}

/// Serves requests until `cancel` fires, then drains in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    cancel: CancellationToken,
) -> Result<(), anyhow::Error> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on http://{addr}/");
        log::info!("  - Register: http://{addr}/api/v1/register");
        log::info!("  - Tasks: http://{addr}/api/v1/task");
        log::info!("  - Status: http://{addr}/status");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
