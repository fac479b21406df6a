//! Task submission handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::messages;
use super::super::types::{ApiState, MessageBody};
use super::{parse_json, string_field};
use crate::admission::{Admission, TaskRequest};
use crate::error_handling::retry_after_secs;

/// Admits a task. A throttled task is still queued and answered with 429
/// plus a `Retry-After` hint.
pub async fn task_handler(State(state): State<ApiState>, body: Bytes) -> Response {
    let request = TaskRequest {
        user_id: string_field(&parse_json(&body), "user_id"),
    };
    match state.admission.submit(&request).await {
        Ok(Admission::Accepted { .. }) => (
            StatusCode::OK,
            Json(MessageBody::new(messages::TASK_QUEUED)),
        )
            .into_response(),
        Ok(Admission::ThrottledButQueued { retry_after, .. }) => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
            Json(MessageBody::new(messages::THROTTLED)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
