// handlers/elevated/erasure/account.rs - POST /api/erasure/account handler

use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::erasure::types::parse_account_id;
use crate::erasure::{Proof, Target};
use crate::error::ApiError;
use crate::middleware::{ErasureOutcome, Operator};

#[derive(Debug, Deserialize)]
pub struct AccountErasureBody {
    pub target_id: String,
    pub code: String,
}

/**
 * POST /api/erasure/account - Erase a client account and everything it owns
 *
 * Expected Input:
 * ```json
 * { "target_id": "account-uuid", "code": "K7QM-2XHP-94TC" }
 * ```
 *
 * The code is consumed on first use whatever the outcome. Runs
 * synchronously; the response carries the terminal request.
 */
pub async fn account_post(
    State(state): State<AppState>,
    Extension(operator): Extension<Operator>,
    payload: Result<Json<AccountErasureBody>, JsonRejection>,
) -> Result<ErasureOutcome, ApiError> {
    let Json(body) = payload?;
    let account_id =
        parse_account_id(&body.target_id).ok_or_else(|| ApiError::bad_request("target_id must be a UUID"))?;
    if body.code.trim().is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }

    tracing::info!(operator = %operator.name, target_id = %account_id, "account erasure requested");
    let request = state
        .coordinator
        .request_erasure(Target::tenant(account_id), Proof::Code(body.code))
        .await?;

    Ok(ErasureOutcome(request))
}
