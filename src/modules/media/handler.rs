use super::dto::{HealthResponse, RenditionsQuery};
use super::model::Manifest;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::Validate;

/// List the renditions available for a URL
#[utoipa::path(
    get,
    path = "/api/v1/renditions",
    params(RenditionsQuery),
    responses(
        (status = 200, description = "Renditions", body = ApiResponse<Manifest>),
        (status = 400, description = "Invalid URL"),
        (status = 403, description = "Destination not allowed"),
        (status = 422, description = "Unsupported source"),
        (status = 429, description = "Too many requests from this client"),
        (status = 502, description = "Extraction failed"),
        (status = 503, description = "Server busy"),
        (status = 504, description = "Extraction timed out")
    ),
    tag = "Media"
)]
pub async fn list_renditions(
    State(state): State<AppState>,
    query: Result<Query<RenditionsQuery>, QueryRejection>,
) -> Response {
    let query = match accept(query) {
        Ok(q) => q,
        Err(e) => return e.into_response(),
    };

    match state.media.renditions(&query.url).await {
        Ok(manifest) => ApiSuccess(
            ApiResponse::success(manifest.as_ref(), "Renditions retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Tool availability
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service status", body = ApiResponse<HealthResponse>)
    ),
    tag = "Media"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let downloads_enabled = state.media.can_download();
    let res = HealthResponse {
        status: if downloads_enabled { "ok" } else { "degraded" }.to_string(),
        extractor: state.tools.extractor.clone(),
        transcoder: state.tools.transcoder.clone(),
        downloads_enabled,
    };
    ApiSuccess(ApiResponse::success(res, "Service is running"), StatusCode::OK)
}

/// Query extraction plus field validation, both answered with 400.
pub(super) fn accept<T: Validate>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    query
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(query)
}
