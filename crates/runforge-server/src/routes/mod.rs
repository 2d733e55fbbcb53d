// crates/runforge-server/src/routes/mod.rs
// ============================================================================
// Module: Runforge Routes
// Description: Assembles the full axum `Router` from per-resource modules.
// Purpose: One place that lists every endpoint spec.md §4.7 names.
// Dependencies: axum, tower-http, crate::{state, cors}
// ============================================================================

//! ## Overview
//! Mirrors spec.md §4.7's endpoint table. Security headers
//! (`X-Content-Type-Options`, `X-Frame-Options`, `Referrer-Policy`,
//! `Cross-Origin-Opener-Policy`) are applied to every response via a
//! `tower::ServiceBuilder` layer; `tower_http::trace::TraceLayer` provides
//! the request logging the teacher's `decision-gate-mcp` server stack uses.

pub mod alerts;
pub mod artifacts;
pub mod download;
pub mod events;
pub mod runs;

use axum::http::header::HeaderName;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::cors::CorsConfig;
use crate::state::AppState;

/// Builds the full application router, optionally layered with CORS.
#[must_use]
pub fn build(state: AppState, cors: &CorsConfig) -> Router {
    let mut router = Router::new()
        .route("/runs", post(runs::create_run).get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route("/runs/{id}/artifacts", get(artifacts::list_artifacts))
        .route("/runs/{id}/events", get(events::list_events))
        .route("/runs/{id}/events/stream", get(events::stream_events))
        .route("/runs/{id}/status", post(runs::update_status))
        .route("/runs/{id}/checkpoints", post(runs::record_checkpoint))
        .route("/runs/public/download", get(download::download))
        .route("/observability/alerts", post(alerts::ingest_alert))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ));

    if let Some(layer) = crate::cors::build_layer(cors) {
        router = router.layer(layer);
    }
    router
}
