//! Error types for materia-api
//!
//! Every handler returns [`ApiResult`]. Domain errors from
//! `materia_common` map onto HTTP status codes here; storage failures are
//! logged in full and reported to the caller as a generic internal error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Role or ownership check failed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// materia-common error
    #[error(transparent)]
    Common(#[from] materia_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(materia_common::Error::Database(err))
    }
}

const GENERIC_INTERNAL: &str = "An internal error occurred";

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String, Option<Value>) {
        use materia_common::Error as E;

        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERIC_INTERNAL.to_string(),
                    None,
                )
            }
            ApiError::Common(err) => match err {
                E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
                E::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
                E::Format { field, reason } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_FORMAT",
                    format!("Malformed {}: {}", field, reason),
                    Some(json!({ "field": field })),
                ),
                E::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
                E::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
                E::PartialResolution { requested, missing } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "PARTIAL_RESOLUTION",
                    format!("Unknown collaborators: {}", missing.join(", ")),
                    Some(json!({ "requested": requested, "missing": missing })),
                ),
                E::Dependency(msg) => {
                    error!("Dependency failure: {}", msg);
                    (StatusCode::BAD_GATEWAY, "DEPENDENCY_FAILURE", msg, None)
                }
                other => {
                    error!("Internal error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        GENERIC_INTERNAL.to_string(),
                        None,
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let (Some(Value::Object(extra)), Some(target)) = (details, error.as_object_mut()) {
            target.extend(extra);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
