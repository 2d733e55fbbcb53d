// crates/runforge-server/src/routes/events.rs
// ============================================================================
// Module: Runforge Event Routes
// Description: `GET /runs/{id}/events`, `GET /runs/{id}/events/stream`.
// Purpose: History read and the live SSE feed.
// Dependencies: axum::response::sse, crate::sse
// ============================================================================

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::Event as SseEvent;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::Json;
use runforge_core::Event;
use runforge_core::RunId;
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::auth::authenticate;
use crate::auth::enforce_tenant;
use crate::auth::extract_token;
use crate::auth::require_scope;
use crate::error::ApiError;
use crate::state::AppState;

fn token_from(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    extract_token(headers, query.get("token").map(String::as_str))
}

/// Response body for `GET /runs/{id}/events`.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    /// Every event recorded for the run, in append order.
    pub events: Vec<Event>,
    /// The run's full status transition history.
    pub status_history: Vec<runforge_core::StatusHistoryEntry>,
}

/// `GET /runs/{id}/events`: events plus status history.
///
/// # Errors
/// See [`ApiError`].
pub async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:read")?;

    let run_id = RunId::from_raw(id);
    let run = state.registry.get_run(&run_id)?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;

    let events = state.registry.get_run_events(&run_id)?;
    let status_history = state.registry.get_status_history(&run_id)?;
    Ok(Json(EventsResponse { events, status_history }))
}

/// `GET /runs/{id}/events/stream`: replays history, then streams live
/// events as Server-Sent Events, with a 30 s keep-alive.
///
/// # Errors
/// See [`ApiError`].
pub async fn stream_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let token = token_from(&headers, &query);
    let auth = authenticate(&state.secrets, token.as_deref())?;
    require_scope(&auth, "runs:events")?;

    let run_id = RunId::from_raw(id);
    let run = state.registry.get_run(&run_id)?;
    enforce_tenant(&auth, run.organization_slug.as_str())?;

    let events = crate::sse::event_stream(std::sync::Arc::clone(&state.registry), run_id)?;
    let frames = events.map(|event| Ok(crate::sse::to_sse_event(&event)));

    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("heartbeat")))
}
