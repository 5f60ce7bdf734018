use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::erasure::{ErasureRequest, ErasureStatus};

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Failed to serialize response data"
                    })),
                )
                    .into_response();
            }
        };

        // Wrap in success envelope
        let envelope = json!({
            "success": true,
            "data": data_value
        });

        (status, Json(envelope)).into_response()
    }
}

/// Terminal erasure request mapped to its HTTP disposition: 200 when
/// completed, 500 with `partial: true` otherwise. The request body is
/// returned either way so callers can see which steps failed.
pub struct ErasureOutcome(pub ErasureRequest);

impl IntoResponse for ErasureOutcome {
    fn into_response(self) -> Response {
        let request = self.0;
        let data = match serde_json::to_value(&request) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize erasure request: {}", e);
                Value::Null
            }
        };

        match request.status {
            ErasureStatus::Completed => (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "All associated data has been erased",
                    "data": data
                })),
            )
                .into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "partial": true,
                    "error": "Erasure finished with failures",
                    "code": "PARTIAL_FAILURE",
                    "data": data
                })),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
