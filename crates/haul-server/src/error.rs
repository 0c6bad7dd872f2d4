use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use haul_core::error::AppError;

use crate::dto::ErrorResponse;

/// Errors a handler can return; converted to a JSON [`ErrorResponse`].
pub enum ApiError {
    App(AppError),
    UnknownSource(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        AppError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        err if err.is_transport() => StatusCode::BAD_GATEWAY,
        AppError::ExtractionError(_) | AppError::SerializationError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::App(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::warn!(error = %err, kind = err.kind(), "Request failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: err.kind().to_string(),
                        message: err.to_string(),
                    },
                )
            }
            ApiError::UnknownSource(name) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "unknown_source".to_string(),
                    message: format!("No source named '{name}'"),
                },
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
