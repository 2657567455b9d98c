use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use concert_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// Request is missing a required field or carries an invalid value.
    ValidationError(String),
    /// No credentials were presented at all.
    Unauthenticated(String),
    AuthenticationError(String),
    AuthorizationError(String),
    NotFoundError(String),
    ConflictError(String),
    PaymentRequired(String),
    Gone(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Unauthenticated(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            CoreError::Expired(msg) => AppError::Gone(msg),
            err @ CoreError::InsufficientSeats { .. } => AppError::ConflictError(err.to_string()),
            CoreError::StorageError(msg) | CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
