// handlers/public/erasure/challenge.rs - POST /public/erasure/challenge handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ChallengeBody {
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeData {
    pub prompt: String,
}

/**
 * POST /public/erasure/challenge - Issue an arithmetic challenge
 *
 * Expected Input:
 * ```json
 * { "fingerprint": "browser-fingerprint" }
 * ```
 *
 * Expected Output (Success):
 * ```json
 * { "success": true, "data": { "prompt": "7 × 3 = ?" } }
 * ```
 *
 * Issuing replaces any outstanding challenge for the fingerprint. While the
 * fingerprint is locked out this returns 429 with `remainingSeconds`.
 */
pub async fn challenge_post(
    State(state): State<AppState>,
    payload: Result<Json<ChallengeBody>, JsonRejection>,
) -> ApiResult<ChallengeData> {
    let Json(body) = payload?;
    let fingerprint = body.fingerprint.trim();
    if fingerprint.is_empty() {
        return Err(ApiError::bad_request("fingerprint is required"));
    }

    let challenge = state.coordinator.issue_challenge(fingerprint).await?;
    Ok(ApiResponse::success(ChallengeData {
        prompt: challenge.prompt,
    }))
}
