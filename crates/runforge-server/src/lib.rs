// crates/runforge-server/src/lib.rs
// ============================================================================
// Module: Runforge HTTP Server
// Description: Public API surface for the run-orchestration HTTP boundary.
// Purpose: Assemble `AppState`, the router, and the bind/serve loop (with or
//          without TLS) from a resolved [`ServerConfig`].
// Dependencies: axum, axum-server, tokio, crate::{routes, state, cors}
// ============================================================================

//! ## Overview
//! Grounded on `decision-gate-mcp/src/server.rs`'s `serve_http`: a plain
//! `tokio::net::TcpListener` bind when no TLS material is configured, or
//! `axum_server::bind_rustls` loaded from a cert/key PEM pair otherwise.
//! Unlike the teacher's JSON-RPC single-route server, this binds the full
//! REST surface [`routes::build`] assembles.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod cors;
pub mod error;
pub mod pagination;
pub mod routes;
pub mod sse;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use runforge_registry::RunRegistry;
use runforge_secrets::SecretsManager;
use runforge_workflow::ExecutorPool;
use thiserror::Error;

pub use cors::CorsConfig;
pub use state::AppState;

/// Resolved TLS material for HTTPS binding.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to a PEM certificate chain.
    pub cert_path: String,
    /// Path to a PEM private key.
    pub key_path: String,
}

/// Everything needed to bind and serve the HTTP boundary.
pub struct ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:8080`.
    pub bind: SocketAddr,
    /// TLS material, if HTTPS is desired.
    pub tls: Option<TlsConfig>,
    /// CORS policy.
    pub cors: CorsConfig,
    /// Shared application state.
    pub state: AppState,
}

/// Failures that can occur while binding or serving the HTTP boundary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// TLS certificate/key material could not be loaded.
    #[error("tls configuration invalid: {0}")]
    Tls(String),
    /// The configured address could not be bound.
    #[error("bind failed: {0}")]
    Bind(String),
    /// The server loop itself failed.
    #[error("server failed: {0}")]
    Serve(String),
}

/// Builds [`AppState`] from its collaborators.
#[must_use]
pub fn build_state(
    registry: Arc<RunRegistry>,
    pool: Arc<ExecutorPool>,
    secrets: Arc<SecretsManager>,
    alert_webhook_token: Option<String>,
    signing_ttl_seconds: i64,
) -> AppState {
    AppState { registry, pool, secrets, alert_webhook_token, signing_ttl_seconds }
}

/// Binds and serves the HTTP boundary until the process is terminated or
/// the listener fails.
///
/// # Errors
/// Returns [`ServerError`] if TLS material is invalid, the address cannot
/// be bound, or the serve loop itself fails.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let app = routes::build(config.state, &config.cors);

    if let Some(tls) = &config.tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|err| ServerError::Tls(err.to_string()))?;
        tracing::info!(bind = %config.bind, tls = true, "runforge-server listening");
        axum_server::bind_rustls(config.bind, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Serve(err.to_string()))
    } else {
        let listener =
            tokio::net::TcpListener::bind(config.bind).await.map_err(|err| ServerError::Bind(err.to_string()))?;
        tracing::info!(bind = %config.bind, tls = false, "runforge-server listening");
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Serve(err.to_string()))
    }
}
