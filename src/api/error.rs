//! Mapping of admission and registration errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::messages;
use super::types::MessageBody;
use crate::error_handling::{AdmissionError, RegistrationError};

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistrationError::BadRequest | RegistrationError::AlreadyRegistered => {
                StatusCode::BAD_REQUEST
            }
            RegistrationError::Store(_) => {
                return server_error();
            }
        };
        (status, Json(MessageBody::new(self.to_string()))).into_response()
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        match self {
            AdmissionError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                Json(MessageBody::new(messages::NOT_REGISTERED)),
            )
                .into_response(),
            AdmissionError::RegistryUnavailable(_)
            | AdmissionError::LimiterFailure(_)
            | AdmissionError::QueueUnavailable(_) => server_error(),
        }
    }
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageBody::new(messages::SERVER_ERROR)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{DatabaseError, QueueError};

    async fn message(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice::<MessageBody>(&bytes)
            .unwrap()
            .message
    }

    #[tokio::test]
    async fn test_registration_errors() {
        let response = RegistrationError::AlreadyRegistered.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(message(response).await, "User ID already registered.");

        let response = RegistrationError::BadRequest.into_response();
        assert_eq!(message(response).await, "User ID and username are required.");

        let response =
            RegistrationError::Store(DatabaseError::FileCreationError("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_admission_errors() {
        let response = AdmissionError::Unauthorized("u9".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, messages::NOT_REGISTERED);

        let response = AdmissionError::Unauthorized(String::new()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response =
            AdmissionError::QueueUnavailable(QueueError::Unavailable("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message(response).await, messages::SERVER_ERROR);
    }
}
