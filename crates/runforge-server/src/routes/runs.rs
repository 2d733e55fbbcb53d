// crates/runforge-server/src/routes/runs.rs
// ============================================================================
// Module: Runforge Run Routes
// Description: `POST /runs`, `GET /runs`, `GET /runs/{id}`,
//              `POST /runs/{id}/status`, `POST /runs/{id}/checkpoints`.
// Purpose: Intake, list, read, and operator-mutate run records.
// Dependencies: axum, runforge-core, runforge-registry, crate::{auth, pagination, state, error}
// ============================================================================

use std::collections::HashMap;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use runforge_core::validation::CreateRunPayload;
use runforge_core::validation::RawCreateRunPayload;
use runforge_core::CoreError;
use runforge_core::Run;
use runforge_core::RunId;
use runforge_core::RunStatus;
use runforge_core::Slug;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::auth::authenticate;
use crate::auth::enforce_tenant;
use crate::auth::extract_token;
use crate::auth::require_scope;
use crate::error::ApiError;
use crate::pagination::paginate;
use crate::pagination::Page;
use crate::pagination::PageQuery;
use crate::state::AppState;

const MAX_RUNS_PAGE: usize = 100;

fn token_from(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    extract_token(headers, query.get("token").map(String::as_str))
}

/// `POST /runs`: validates, creates the run, and enqueues it for execution.
///
/// # Errors
/// See [`ApiError`]; validation failures surface as `400`, scope/tenant
/// failures as `403`.
pub async fn create_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(raw): Json<RawCreateRunPayload>,
) -> Result<(StatusCode, Json<Run>), ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:create")?;

    let explicit_slug = raw.organization_slug.clone();
    let mut payload: CreateRunPayload = CreateRunPayload::from_raw(raw)?;

    if let Some(principal_slug) = &auth.organization_slug {
        if let Some(explicit) = explicit_slug.filter(|slug| !slug.trim().is_empty()) {
            if Slug::normalize(&explicit).as_str() != principal_slug.as_str() {
                return Err(ApiError::Core(CoreError::Forbidden("organization_mismatch".to_string())));
            }
        }
        payload.organization_slug = Slug::from_raw(principal_slug.clone());
    }

    let run = state.registry.create_run(payload)?;
    state
        .pool
        .submit(run.id.clone())
        .map_err(|_| ApiError::Core(CoreError::Internal("executor pool is not accepting new work".to_string())))?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// `GET /runs`: paginated list, filtered to the principal's org unless it
/// carries `runs:read:all`.
///
/// # Errors
/// See [`ApiError`].
pub async fn list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Page<runforge_registry::RunSummary>>, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:read")?;

    let mut runs = state.registry.list_runs()?;
    if !auth.reads_all_tenants() {
        if let Some(slug) = &auth.organization_slug {
            runs.retain(|run| &run.slug == slug);
        }
    }

    let page_query = page_query_from(&query);
    Ok(Json(paginate(runs, &page_query, MAX_RUNS_PAGE)))
}

/// `GET /runs/{id}`: the full manifest.
///
/// # Errors
/// See [`ApiError`].
pub async fn get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:read")?;

    let run = state.registry.get_run(&RunId::from_raw(id))?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;
    Ok(Json(run))
}

/// Body for `POST /runs/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    /// The status to transition to.
    pub status: RunStatus,
    /// Optional metadata to attach to this transition.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// `POST /runs/{id}/status`: an operator-driven status update.
///
/// # Errors
/// See [`ApiError`].
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateBody>,
) -> Result<StatusCode, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:create")?;

    let run_id = RunId::from_raw(id);
    let run = state.registry.get_run(&run_id)?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;

    state.registry.update_status(&run_id, body.status, body.metadata)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body for `POST /runs/{id}/checkpoints`.
#[derive(Debug, Deserialize)]
pub struct CheckpointBody {
    /// Checkpoint name, e.g. `"auth.completed"`.
    pub name: String,
    /// Optional checkpoint details.
    #[serde(default)]
    pub details: Option<Map<String, Value>>,
}

/// `POST /runs/{id}/checkpoints`: an operator-driven checkpoint record.
///
/// # Errors
/// See [`ApiError`].
pub async fn record_checkpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
    Json(body): Json<CheckpointBody>,
) -> Result<StatusCode, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:create")?;

    let run_id = RunId::from_raw(id);
    let run = state.registry.get_run(&run_id)?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;

    state.registry.record_checkpoint(&run_id, &body.name, body.details)?;
    Ok(StatusCode::NO_CONTENT)
}

fn page_query_from(query: &HashMap<String, String>) -> PageQuery {
    PageQuery {
        offset: query.get("offset").and_then(|value| value.parse().ok()),
        limit: query.get("limit").and_then(|value| value.parse().ok()),
    }
}
