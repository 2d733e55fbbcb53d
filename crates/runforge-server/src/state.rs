// crates/runforge-server/src/state.rs
// ============================================================================
// Module: Runforge Server State
// Description: Shared application state handed to every axum handler.
// Purpose: Bundle the registry, executor pool, and secrets manager behind
//          one `Clone`-cheap handle.
// Dependencies: runforge-registry, runforge-workflow, runforge-secrets
// ============================================================================

//! ## Overview
//! `AppState` is the `axum::extract::State` payload every route handler
//! receives. Grounded on `decision-gate-mcp/src/server.rs`'s `ServerState`
//! (router + metrics + audit bundled behind one clonable struct).

use std::sync::Arc;

use runforge_registry::RunRegistry;
use runforge_secrets::SecretsManager;
use runforge_workflow::ExecutorPool;

/// Shared, cheaply clonable handle to every collaborator a route needs.
#[derive(Clone)]
pub struct AppState {
    /// The durable run registry.
    pub registry: Arc<RunRegistry>,
    /// The executor pool new runs are submitted to.
    pub pool: Arc<ExecutorPool>,
    /// The hot-reloading secrets manager backing auth and signed URLs.
    pub secrets: Arc<SecretsManager>,
    /// Alert-webhook bearer token, checked separately from the scoped
    /// token registry per spec.md §4.7's `runs:events`-free alert endpoint.
    pub alert_webhook_token: Option<String>,
    /// Lifetime of a freshly signed artifact download URL, in seconds.
    pub signing_ttl_seconds: i64,
}
