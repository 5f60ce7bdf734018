// handlers/public/erasure/session.rs - POST /public/erasure/session handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::erasure::types::parse_session_id;
use crate::erasure::{Proof, Target};
use crate::error::ApiError;
use crate::middleware::ErasureOutcome;

#[derive(Debug, Deserialize)]
pub struct SessionErasureBody {
    pub session_id: String,
    pub fingerprint: String,
    /// Accepts `"12"` or `12`
    pub answer: Value,
}

/**
 * POST /public/erasure/session - Erase an anonymous consent session
 *
 * Expected Input:
 * ```json
 * { "session_id": "uuid-v4", "fingerprint": "...", "answer": "21" }
 * ```
 *
 * 200 when every record is gone, 500 with `partial: true` if any step failed,
 * 401 for a wrong answer, 429 while locked out, 409 if the session is
 * already being erased.
 */
pub async fn session_post(
    State(state): State<AppState>,
    payload: Result<Json<SessionErasureBody>, JsonRejection>,
) -> Result<ErasureOutcome, ApiError> {
    let Json(body) = payload?;

    let session_id = parse_session_id(&body.session_id)
        .ok_or_else(|| ApiError::bad_request("session_id must be a v4 UUID"))?;
    let fingerprint = body.fingerprint.trim();
    if fingerprint.is_empty() {
        return Err(ApiError::bad_request("fingerprint is required"));
    }
    let answer = match body.answer {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return Err(ApiError::bad_request("answer must be a number")),
    };

    let request = state
        .coordinator
        .request_erasure(
            Target::session(session_id),
            Proof::Challenge {
                fingerprint: fingerprint.to_string(),
                answer,
            },
        )
        .await?;

    Ok(ErasureOutcome(request))
}
