// crates/runforge-server/src/routes/download.rs
// ============================================================================
// Module: Runforge Public Download
// Description: `GET /runs/public/download`.
// Purpose: Serve artifact bytes to holders of a valid signed URL — no
//          bearer token involved, per spec.md §4.7's `none (signed)` row.
// Dependencies: runforge-secrets::signing, runforge-registry, tokio::fs
// ============================================================================

//! ## Overview
//! Tenant, expiry, signature, and path-containment are checked
//! independently, per spec.md §4.7 — a path traversal attempt fails on
//! containment even if it happens to carry a valid signature for some
//! other path, and an expired link fails regardless of signature validity.
//! Every attempt, successful or not, is written to the audit log.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::State;
use runforge_core::CoreError;
use runforge_core::RunId;
use runforge_core::Timestamp;
use runforge_registry::AuditEvent;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters carried by a signed download URL.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    run_id: String,
    org: String,
    path: String,
    expires: i64,
    signature: String,
}

/// `GET /runs/public/download`: serves artifact bytes to a valid signed URL.
///
/// # Errors
/// Returns [`ApiError`] mapping to `401` for an invalid or expired
/// signature and `400`/`404` for a malformed or missing artifact path.
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<(axum::http::HeaderMap, Bytes), ApiError> {
    let query = parse_query(&query)?;
    let run_id = RunId::from_raw(query.run_id.clone());

    let audit_base = AuditEvent::new("artifact.download")
        .with_run_id(run_id.as_str())
        .with_token(&query.signature);

    let outcome = serve(&state, &query, &run_id).await;

    let audit_event = match &outcome {
        Ok(_) => audit_base.with_status("success"),
        Err(_) => audit_base.with_status("denied"),
    };
    state.registry.audit().record(audit_event);

    outcome
}

async fn serve(
    state: &AppState,
    query: &DownloadQuery,
    run_id: &RunId,
) -> Result<(axum::http::HeaderMap, Bytes), ApiError> {
    let keys = state.secrets.get_signing_keys();
    let now = Timestamp::now().as_offset().unix_timestamp();
    if query.expires < now {
        return Err(ApiError::Core(CoreError::Expired));
    }

    let verified =
        runforge_secrets::verify(&keys, run_id.as_str(), &query.org, &query.path, query.expires, &query.signature);
    if !verified {
        return Err(ApiError::Core(CoreError::SignatureInvalid));
    }

    let run = state.registry.get_run(run_id)?;
    if run.organization_slug.as_str() != query.org {
        return Err(ApiError::Core(CoreError::Forbidden("organization_mismatch".to_string())));
    }

    let artifact_path = state.registry.get_artifact_path(run_id, &query.path)?;
    let bytes = tokio::fs::read(&artifact_path).await.map_err(CoreError::from)?;

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(axum::http::header::CONTENT_TYPE, axum::http::HeaderValue::from_static("application/octet-stream"));
    Ok((headers, Bytes::from(bytes)))
}

fn parse_query(raw: &HashMap<String, String>) -> Result<DownloadQuery, ApiError> {
    let get = |key: &str| raw.get(key).cloned().ok_or_else(|| missing(key));
    Ok(DownloadQuery {
        run_id: get("run_id")?,
        org: get("org")?,
        path: get("path")?,
        expires: get("expires")?.parse().map_err(|_| missing("expires"))?,
        signature: get("signature")?,
    })
}

fn missing(field: &str) -> ApiError {
    ApiError::Core(CoreError::single_validation(field, "missing required query parameter"))
}
