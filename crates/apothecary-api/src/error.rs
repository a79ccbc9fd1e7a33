//! API error types and JSON error response formatting.
//!
//! Every failed request gets a `{error, message}` JSON body with a status
//! code derived from the underlying error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use apothecary_core::error::ApothecaryError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - invalid query, top_k or body.
    BadRequest(String),
    /// 404 Not Found - unknown resource.
    NotFound(String),
    /// 500 Internal Server Error - configuration or I/O failure.
    Internal(String),
    /// 503 Service Unavailable - index or embedding model unusable.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ApothecaryError> for ApiError {
    fn from(err: ApothecaryError) -> Self {
        match &err {
            ApothecaryError::Input(msg) => ApiError::BadRequest(msg.clone()),
            ApothecaryError::Retrieval(_) | ApothecaryError::Embedding(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
