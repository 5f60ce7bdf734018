// handlers/elevated/erasure/requests.rs - GET /api/erasure/requests/:id, POST /api/erasure/requests/:id/resume

use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::erasure::ErasureRequest;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ErasureOutcome, Operator};

fn parse_request_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("request id must be a UUID"))
}

pub async fn request_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ErasureRequest> {
    let request = state.coordinator.request(parse_request_id(&id)?).await?;
    Ok(ApiResponse::success(request))
}

/// Re-run an interrupted or partially failed request under the target lock.
/// A completed request is returned as is.
pub async fn request_resume(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    Path(id): Path<String>,
) -> Result<ErasureOutcome, ApiError> {
    let request_id = parse_request_id(&id)?;
    tracing::info!(operator = %operator.name, request_id = %request_id, "resume requested");

    let request = state.coordinator.resume(request_id).await?;
    Ok(ErasureOutcome(request))
}
