// crates/runforge-server/src/error.rs
// ============================================================================
// Module: Runforge API Errors
// Description: Maps `CoreError` and boundary-local failures onto HTTP
//              responses with structured `{error, field_errors?}` bodies.
// Purpose: Give every handler one `?`-friendly error type; never leak raw
//          exception text to a caller.
// Dependencies: axum, runforge-core::CoreError, thiserror
// ============================================================================

//! ## Overview
//! Per spec.md §7, the HTTP boundary never returns raw error text. `ApiError`
//! wraps [`CoreError`] (and the two auth-only failure modes bearer-token
//! extraction can hit) and implements [`IntoResponse`], picking the status
//! code the error-taxonomy table specifies.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use runforge_core::CoreError;
use serde::Serialize;
use serde_json::Value;

/// The boundary's single error type; every handler returns `Result<_, ApiError>`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain-level failure from `runforge-core`/`runforge-registry`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No bearer token was presented where one is required.
    #[error("authentication required")]
    MissingCredential,

    /// The presented token does not appear in any configured registry.
    #[error("invalid credential")]
    InvalidCredential,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, field_errors) = match &self {
            Self::Core(CoreError::Validation(errors)) => {
                (StatusCode::BAD_REQUEST, "validation failed".to_string(), Some(serde_json::to_value(errors).unwrap_or(Value::Null)))
            }
            Self::Core(CoreError::NotFound(what)) => (StatusCode::NOT_FOUND, format!("not found: {what}"), None),
            Self::Core(CoreError::InvalidPath(what)) => (StatusCode::BAD_REQUEST, format!("invalid path: {what}"), None),
            Self::Core(CoreError::Forbidden(reason)) => (StatusCode::FORBIDDEN, reason.clone(), None),
            Self::Core(CoreError::Unauthorized(reason)) => (StatusCode::UNAUTHORIZED, reason.clone(), None),
            Self::Core(CoreError::SignatureInvalid) => (StatusCode::UNAUTHORIZED, "signature invalid".to_string(), None),
            Self::Core(CoreError::Expired) => (StatusCode::FORBIDDEN, "signed url expired".to_string(), None),
            Self::Core(CoreError::Internal(reason)) => {
                tracing::error!(error = %reason, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string(), None)
            }
            Self::MissingCredential => (StatusCode::UNAUTHORIZED, "authentication required".to_string(), None),
            Self::InvalidCredential => (StatusCode::UNAUTHORIZED, "invalid credential".to_string(), None),
        };
        (status, Json(ErrorBody { error: message, field_errors })).into_response()
    }
}
