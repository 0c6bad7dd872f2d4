use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::dto::ErrorResponse;
use crate::state::AppState;

fn reject(status: StatusCode, error: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
    };
    (status, axum::Json(body)).into_response()
}

/// Middleware guarding maintenance endpoints with `Authorization: Bearer <token>`.
///
/// Answers 403 when no admin token is configured and 401 when the header is
/// missing or does not match.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return reject(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Maintenance endpoints are disabled. Set HAUL_ADMIN_TOKEN to enable them.",
        );
    };

    let authenticated = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));

    if !authenticated {
        tracing::warn!(path = %request.uri().path(), "Rejected maintenance request");
        return reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing or invalid Authorization header. Expected: Bearer <admin_token>",
        );
    }

    next.run(request).await
}
