// handlers/elevated/erasure/plan.rs - GET /api/erasure/plan/:kind/:id handler

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::erasure::types::{parse_account_id, parse_session_id};
use crate::erasure::{DeletionPlan, Target, TargetKind};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// Dry run: the ordered deletion plan for a target, without touching data
pub async fn plan_get(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<DeletionPlan> {
    let kind = TargetKind::parse(&kind)
        .ok_or_else(|| ApiError::bad_request(format!("unknown target kind '{}'", kind)))?;
    let id = match kind {
        TargetKind::Tenant => parse_account_id(&id),
        TargetKind::Session => parse_session_id(&id),
    }
    .ok_or_else(|| ApiError::bad_request("invalid target id"))?;

    Ok(ApiResponse::success(
        state.coordinator.preview(&Target::from_parts(kind, id)),
    ))
}
