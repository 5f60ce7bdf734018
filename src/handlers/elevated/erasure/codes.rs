// handlers/elevated/erasure/codes.rs - POST /api/erasure/codes handler

use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::erasure::codes::IssuedCode;
use crate::erasure::types::parse_account_id;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Operator};

#[derive(Debug, Deserialize)]
pub struct IssueCodeBody {
    pub target_id: String,
}

/// Issue a verification code for an account. The plain code is only ever
/// returned here; the operator relays it to the account holder.
pub async fn codes_post(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    payload: Result<Json<IssueCodeBody>, JsonRejection>,
) -> ApiResult<IssuedCode> {
    let Json(body) = payload?;
    let account_id =
        parse_account_id(&body.target_id).ok_or_else(|| ApiError::bad_request("target_id must be a UUID"))?;

    let issued = state.coordinator.issue_code(account_id).await?;
    tracing::info!(operator = %operator.name, target_id = %account_id, "verification code issued");

    Ok(ApiResponse::created(issued))
}
