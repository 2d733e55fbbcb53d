// crates/runforge-server/src/routes/artifacts.rs
// ============================================================================
// Module: Runforge Artifact Routes
// Description: `GET /runs/{id}/artifacts`.
// Purpose: Paginated artifact manifest, annotated with time-limited signed
//          download URLs when a signing key is configured.
// Dependencies: runforge-registry::artifacts, runforge-secrets::signing
// ============================================================================

use std::collections::HashMap;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use runforge_core::RunId;
use runforge_registry::artifacts::build_manifest;
use runforge_registry::artifacts::ArtifactEntry;
use serde::Serialize;

use crate::auth::authenticate;
use crate::auth::enforce_tenant;
use crate::auth::extract_token;
use crate::auth::require_scope;
use crate::error::ApiError;
use crate::pagination::paginate;
use crate::pagination::Page;
use crate::pagination::PageQuery;
use crate::state::AppState;

const DEFAULT_ARTIFACTS_PAGE: i64 = 200;
const MAX_ARTIFACTS_PAGE: usize = 500;

/// One artifact entry, annotated with a signed download URL when possible.
#[derive(Debug, Serialize)]
pub struct SignedArtifactEntry {
    /// Path relative to the run directory.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// SHA-256 digest of the file contents.
    pub sha256: String,
    /// Time-limited signed download URL, present only when a signing key
    /// is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// `GET /runs/{id}/artifacts`: a paginated artifact manifest.
///
/// # Errors
/// See [`ApiError`].
pub async fn list_artifacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
) -> Result<Json<Page<SignedArtifactEntry>>, ApiError> {
    let token = extract_token(&headers, query.get("token").map(String::as_str));
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:read")?;

    let run_id = RunId::from_raw(id);
    let run = state.registry.get_run(&run_id)?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;

    let run_dir = state.registry.run_directory(&run_id)?;
    let manifest = build_manifest(&run_dir, run_id.as_str())?;

    let keys = state.secrets.get_signing_keys();
    let expires_at = (runforge_core::Timestamp::now().as_offset().unix_timestamp()) + state.signing_ttl_seconds;
    let entries: Vec<SignedArtifactEntry> = manifest
        .entries
        .into_iter()
        .map(|entry| annotate(entry, &run, &keys, expires_at))
        .collect();

    let page_query = PageQuery {
        offset: query.get("offset").and_then(|value| value.parse().ok()),
        limit: Some(query.get("limit").and_then(|value| value.parse().ok()).unwrap_or(DEFAULT_ARTIFACTS_PAGE)),
    };
    Ok(Json(paginate(entries, &page_query, MAX_ARTIFACTS_PAGE)))
}

fn annotate(
    entry: ArtifactEntry,
    run: &runforge_core::Run,
    keys: &runforge_secrets::SigningKeySet,
    expires_at: i64,
) -> SignedArtifactEntry {
    let download_url = keys.primary.as_ref().and_then(|_| {
        runforge_secrets::sign(keys, run.id.as_str(), run.organization_slug.as_str(), &entry.path, expires_at)
            .ok()
            .map(|signature| {
                format!(
                    "/runs/public/download?run_id={}&org={}&path={}&expires={}&signature={}",
                    run.id.as_str(),
                    run.organization_slug.as_str(),
                    urlencoding_path(&entry.path),
                    expires_at,
                    signature
                )
            })
    });

    SignedArtifactEntry { path: entry.path, size: entry.size, sha256: entry.sha256.to_string(), download_url }
}

fn urlencoding_path(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
}
