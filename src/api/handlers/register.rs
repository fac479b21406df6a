//! Registration handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::messages;
use super::super::types::{ApiState, MessageBody};
use super::{parse_json, string_field};
use crate::admission::RegistrationRequest;

pub async fn register_handler(State(state): State<ApiState>, body: Bytes) -> Response {
    let body = parse_json(&body);
    let request = RegistrationRequest {
        user_id: string_field(&body, "user_id"),
        username: string_field(&body, "username"),
    };
    match state.admission.register(&request).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(MessageBody::new(messages::REGISTERED)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
