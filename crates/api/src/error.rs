//! Mapping of domain errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tesoro_shared::AppError;
use tracing::error;

/// Error returned by handlers.
///
/// Every module error converts into [`AppError`] and from there into an
/// `{"error", "message"}` body with the matching status.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = self.0.error_code().to_ascii_lowercase();

        // Storage and internal details stay in the logs.
        let message = match &self.0 {
            AppError::Database(_) | AppError::Internal(_) => {
                error!(error = %self.0, "request failed");
                "An error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": code, "message": message });
        if self.0.is_retryable() {
            body["retryable"] = json!(true);
        }
        (status, Json(body)).into_response()
    }
}

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;
