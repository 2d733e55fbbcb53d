// crates/runforge-server/src/routes/alerts.rs
// ============================================================================
// Module: Runforge Alert Ingestion
// Description: `POST /observability/alerts`.
// Purpose: Accept an external alert summary, guarded by a static bearer
//          token rather than the scoped token registry, and record it to
//          the audit log.
// Dependencies: runforge-registry::audit
// ============================================================================

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use runforge_registry::AuditEvent;
use serde_json::Map;
use serde_json::Value;

use crate::auth::extract_token;
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /observability/alerts`: ingests an alert summary into the audit
/// log. Authenticated by a single static webhook token, independent of the
/// scoped token registry used elsewhere.
///
/// # Errors
/// Returns [`ApiError::MissingCredential`] or [`ApiError::InvalidCredential`]
/// if the bearer token is absent or wrong.
pub async fn ingest_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Map<String, Value>>,
) -> Result<StatusCode, ApiError> {
    let token = extract_token(&headers, None).ok_or(ApiError::MissingCredential)?;

    let expected = state.alert_webhook_token.as_deref().ok_or(ApiError::MissingCredential)?;
    if token != expected {
        return Err(ApiError::InvalidCredential);
    }

    let event = AuditEvent::new("observability.alert").with_metadata(Value::Object(body));
    state.registry.audit().record(event);
    Ok(StatusCode::ACCEPTED)
}
