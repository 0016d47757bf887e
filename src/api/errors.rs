use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::grading::GradingError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::NotFound(what) => {
                let mut detail = what.to_string();
                if let Some(first) = detail.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                Self::NotFound(format!("{detail} not found"))
            }
            GradingError::InvalidRubric(_) | GradingError::ZeroMaxScore => {
                Self::BadRequest(err.user_message())
            }
            GradingError::QueueFull | GradingError::ProviderUnavailable => {
                Self::ServiceUnavailable(err.user_message())
            }
            GradingError::Persistence(source) => Self::internal(source, "Database error"),
            GradingError::CallFailed { .. } | GradingError::MalformedResponse(_) => {
                Self::internal(&err, "Grading failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::ServiceUnavailable(message) => {
                tracing::warn!(error = %message, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grading_errors_map_to_statuses() {
        let cases = [
            (GradingError::NotFound("submission"), StatusCode::NOT_FOUND),
            (GradingError::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
            (GradingError::ZeroMaxScore, StatusCode::BAD_REQUEST),
            (GradingError::Persistence(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn not_found_detail_is_capitalised() {
        match ApiError::from(GradingError::NotFound("grading result")) {
            ApiError::NotFound(detail) => assert_eq!(detail, "Grading result not found"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
