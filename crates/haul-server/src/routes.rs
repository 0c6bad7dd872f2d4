use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;

use crate::auth::require_admin_token;
use crate::dto::{HealthResponse, ResetResponse, SearchQuery, SearchResponse, SourceHealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let maintenance = Router::new()
        .route("/v1/maintenance/reset", post(reset))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/v1/sources/{source}/search", get(search))
        .route("/api-docs/openapi.json", get(openapi_json));

    public.merge(maintenance).with_state(state)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sources/{source}/search",
    params(
        ("source" = String, Path, description = "Source name, e.g. vestiaire or vinted"),
        SearchQuery,
    ),
    responses(
        (status = 200, description = "Listings, possibly placeholder data", body = SearchResponse),
        (status = 400, description = "Invalid search", body = crate::dto::ErrorResponse),
        (status = 404, description = "Unknown source", body = crate::dto::ErrorResponse),
        (status = 504, description = "Search exceeded the request timeout", body = crate::dto::ErrorResponse),
    ),
    tag = "search"
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<axum::Json<SearchResponse>, ApiError> {
    let service = state
        .source(&source)
        .ok_or_else(|| ApiError::UnknownSource(source.clone()))?;
    let request = query.into_request()?;

    let acquisition = match state.request_timeout {
        Some(deadline) => service.acquire_within(&request, deadline).await?,
        None => service.acquire(&request).await?,
    };

    tracing::debug!(
        source = %source,
        origin = %acquisition.origin,
        records = acquisition.records.len(),
        "Search served"
    );
    Ok(axum::Json(acquisition.into()))
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/maintenance/reset",
    responses(
        (status = 200, description = "Safeguards reset", body = ResetResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Maintenance disabled"),
    ),
    security(("bearer" = [])),
    tag = "maintenance"
)]
pub async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reset = state
        .sources
        .iter()
        .map(|(name, service)| {
            service.safeguards().reset();
            name.clone()
        })
        .collect();

    axum::Json(ResetResponse { reset })
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Per-source safeguard state", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sources: Vec<SourceHealthResponse> = state
        .sources
        .iter()
        .map(|(name, service)| SourceHealthResponse::new(name, service.safeguards().snapshot()))
        .collect();

    // Always 200: an open breaker still serves placeholder data.
    let status = if sources.iter().all(|s| s.healthy) {
        "healthy"
    } else {
        "degraded"
    };

    axum::Json(HealthResponse { status, sources })
}

async fn openapi_json() -> impl IntoResponse {
    axum::Json(ApiDoc::openapi())
}
