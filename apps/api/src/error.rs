use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use consentry_core::AppError;
use consentry_domain::AccessDenyReason;

mod types;

pub use types::ErrorResponse;

/// HTTP API error wrapper around application errors and access refusals.
#[derive(Debug)]
pub enum ApiError {
    /// Failure raised by a use-case.
    App(AppError),
    /// Access attempt refused by the scope evaluator.
    AccessDenied(AccessDenyReason),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::App(AppError::Validation(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::App(AppError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::App(AppError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::App(AppError::Unauthorized(_)) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::App(AppError::Forbidden(_)) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::App(AppError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::AccessDenied(reason) => (StatusCode::FORBIDDEN, reason.code()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            Self::App(AppError::Internal(detail)) => {
                tracing::error!(error = %detail, "request failed with internal error");
                "internal server error".to_owned()
            }
            Self::App(error) => error.to_string(),
            Self::AccessDenied(reason) => reason.message().to_owned(),
        };

        (status, Json(ErrorResponse::new(message, code))).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests;
