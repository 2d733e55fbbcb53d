// crates/runforge-server/src/auth.rs
// ============================================================================
// Module: Runforge HTTP Authentication
// Description: Bearer-token extraction and scope/tenant authorization.
// Purpose: Resolve an incoming request's principal and check it against an
//          endpoint's required scope before a handler runs.
// Dependencies: runforge-secrets, axum::http
// ============================================================================

//! ## Overview
//! Grounded on `decision-gate-mcp/src/auth.rs`'s `AuthContext`/`AuthError`
//! shape: a request carries at most one bearer token (header or `?token=`
//! query parameter), which is looked up in the [`runforge_secrets::SecretsManager`]'s
//! token registry. Per spec.md §4.7, an empty registry opens every scope
//! (single-tenant dev mode); otherwise the looked-up entry's scopes must
//! cover the endpoint's required scope, honoring `runs:*`/`*` wildcards.

use axum::http::HeaderMap;
use runforge_secrets::SecretsManager;
use runforge_secrets::TokenRegistryEntry;
use runforge_secrets::DEFAULT_OPEN_SCOPES;

use crate::error::ApiError;

/// Maximum accepted `Authorization` header length, matching
/// `decision-gate-mcp`'s bearer-parsing guard.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// The resolved identity and permissions for one request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Organization slug the principal belongs to, or `None` in open mode
    /// with no token presented.
    pub organization_slug: Option<String>,
    /// Role the principal authenticated as.
    pub actor_role: Option<String>,
    /// Scopes held by the principal.
    pub scopes: Vec<String>,
    /// First 12 hex chars of SHA-256(token), for audit logging.
    pub token_fingerprint: Option<String>,
}

impl AuthContext {
    /// Returns `true` if `scope` is covered, honoring `runs:*` and `*`.
    #[must_use]
    pub fn allows(&self, scope: &str) -> bool {
        self.scopes.iter().any(|held| {
            held == "*" || held == scope || (held.ends_with(":*") && scope.starts_with(&held[..held.len() - 1]))
        })
    }

    /// Returns `true` if the principal may read across every tenant.
    #[must_use]
    pub fn reads_all_tenants(&self) -> bool {
        self.allows("runs:read:all")
    }
}

/// Extracts the bearer token from `Authorization: Bearer <t>` or `?token=<t>`.
#[must_use]
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(header) = headers.get(axum::http::header::AUTHORIZATION) {
        if header.len() > MAX_AUTH_HEADER_BYTES {
            return None;
        }
        if let Ok(value) = header.to_str() {
            if let Some((scheme, token)) = value.split_once(' ') {
                if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    query_token.filter(|token| !token.is_empty()).map(ToString::to_string)
}

/// Resolves an [`AuthContext`] for the presented token against `secrets`'s
/// current token registry.
///
/// # Errors
/// Returns [`ApiError::InvalidCredential`] if a token was presented but
/// does not appear in the registry. A missing token is not an error here —
/// callers decide whether the endpoint requires one.
pub fn authenticate(secrets: &SecretsManager, token: Option<&str>) -> Result<AuthContext, ApiError> {
    let registry = secrets.get_token_registry();

    let Some(token) = token else {
        if registry.is_empty() {
            return Ok(open_mode_context());
        }
        return Ok(AuthContext { organization_slug: None, actor_role: None, scopes: Vec::new(), token_fingerprint: None });
    };

    match registry.get(token) {
        Some(entry) => Ok(context_for_entry(entry, token)),
        None if registry.is_empty() => Ok(open_mode_context()),
        None => Err(ApiError::InvalidCredential),
    }
}

fn open_mode_context() -> AuthContext {
    AuthContext {
        organization_slug: None,
        actor_role: None,
        scopes: DEFAULT_OPEN_SCOPES.iter().map(ToString::to_string).collect(),
        token_fingerprint: None,
    }
}

fn context_for_entry(entry: &TokenRegistryEntry, token: &str) -> AuthContext {
    AuthContext {
        organization_slug: Some(entry.organization_slug.clone()),
        actor_role: Some(entry.actor_role.clone()),
        scopes: entry.scopes.clone(),
        token_fingerprint: Some(runforge_registry::hash_token(token)),
    }
}

/// Checks tenant scoping for a GET against `target_slug`: allowed if the
/// principal carries `runs:read:all`/`*`, has no slug of its own (open
/// mode), or matches `target_slug` exactly.
///
/// # Errors
/// Returns [`ApiError::Core`]`(`[`runforge_core::CoreError::Forbidden`]`)`
/// on a tenant mismatch.
pub fn enforce_tenant(auth: &AuthContext, target_slug: &str) -> Result<(), ApiError> {
    if auth.reads_all_tenants() {
        return Ok(());
    }
    match &auth.organization_slug {
        None => Ok(()),
        Some(slug) if slug == target_slug => Ok(()),
        Some(_) => Err(ApiError::Core(runforge_core::CoreError::Forbidden("organization_mismatch".to_string()))),
    }
}

/// Checks that `auth` carries `scope`.
///
/// # Errors
/// Returns [`ApiError::Core`]`(`[`runforge_core::CoreError::Forbidden`]`)`
/// if the scope is missing, or [`ApiError::MissingCredential`] if no
/// scopes at all were resolved (an invalid token was rejected upstream,
/// so this only fires when a token was required but absent).
pub fn require_scope(auth: &AuthContext, scope: &str) -> Result<(), ApiError> {
    if auth.allows(scope) {
        return Ok(());
    }
    if auth.scopes.is_empty() {
        return Err(ApiError::MissingCredential);
    }
    Err(ApiError::Core(runforge_core::CoreError::Forbidden(format!("scope {scope} required"))))
}

#[cfg(test)]
mod tests {
    use super::authenticate;
    use super::enforce_tenant;
    use super::extract_token;
    use super::require_scope;
    use axum::http::HeaderMap;
    use axum::http::HeaderValue;
    use runforge_secrets::SecretsManager;
    use runforge_secrets::SecretsManagerConfig;

    #[test]
    fn bearer_header_is_extracted_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers, None), Some("abc123".to_string()));
    }

    #[test]
    fn query_token_is_used_when_no_header_present() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, Some("qtok")), Some("qtok".to_string()));
    }

    #[test]
    fn empty_registry_opens_every_scope() {
        let secrets = SecretsManager::new(SecretsManagerConfig::default());
        let auth = authenticate(&secrets, None).unwrap();
        assert!(auth.allows("runs:create"));
        assert!(auth.allows("runs:read:all"));
    }

    #[test]
    fn unknown_token_against_a_nonempty_registry_is_rejected() {
        let secrets = SecretsManager::new(SecretsManagerConfig {
            default_token: Some("known".to_string()),
            ..Default::default()
        });
        assert!(authenticate(&secrets, Some("unknown")).is_err());
    }

    #[test]
    fn tenant_mismatch_without_read_all_is_forbidden() {
        let secrets = SecretsManager::new(SecretsManagerConfig {
            default_token: Some("tok".to_string()),
            ..Default::default()
        });
        let auth = authenticate(&secrets, Some("tok")).unwrap();
        assert!(enforce_tenant(&auth, "other-org").is_err());
        assert!(enforce_tenant(&auth, "default").is_ok());
    }

    #[test]
    fn missing_scope_is_forbidden_not_unauthorized() {
        let secrets = SecretsManager::new(SecretsManagerConfig {
            default_token: Some("tok".to_string()),
            ..Default::default()
        });
        let auth = authenticate(&secrets, Some("tok")).unwrap();
        assert!(require_scope(&auth, "runs:read:all").is_err());
        assert!(require_scope(&auth, "runs:create").is_ok());
    }
}
