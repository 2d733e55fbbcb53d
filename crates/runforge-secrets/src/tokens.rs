// crates/runforge-secrets/src/tokens.rs
// ============================================================================
// Module: Runforge Token Registry
// Description: Bearer-token → tenant/role/scope entries and role defaults.
// Purpose: Normalize static/env/file token sources into one entry shape the
//          HTTP boundary can authorize against.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/security.py`'s `ROLE_DEFAULT_SCOPES`,
//! `scopes_for_role`, `normalize_registry_entry`, and `load_token_registry`:
//! a token registry entry always resolves organization/slug/role/scopes
//! from a loosely-shaped JSON object, falling back to role defaults when
//! `scopes` is absent or malformed.

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One entry in the token registry: what a bearer token authorizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistryEntry {
    /// Organization display name.
    pub organization: String,
    /// Normalized organization slug (on-disk partition / tenant check).
    pub organization_slug: String,
    /// Role driving the default scope set when none is supplied explicitly.
    pub actor_role: String,
    /// Capability strings this token carries (e.g. `runs:create`).
    pub scopes: Vec<String>,
}

impl TokenRegistryEntry {
    /// Returns `true` if `scope` is covered by this entry's scopes, honoring
    /// the `runs:*` and `*` wildcards.
    #[must_use]
    pub fn allows(&self, scope: &str) -> bool {
        self.scopes.iter().any(|held| {
            held == "*" || held == scope || (held.ends_with(":*") && scope.starts_with(&held[..held.len() - 1]))
        })
    }
}

/// Returns the sorted default scope list for `role`, falling back to
/// `qa_viewer`'s scopes for unknown roles.
#[must_use]
pub fn scopes_for_role(role: &str) -> Vec<String> {
    let scopes: &[&str] = match role {
        "qa_runner" => &["runs:create", "runs:read", "runs:events"],
        "admin" => &["runs:create", "runs:read", "runs:events", "runs:read:all"],
        _ => &["runs:read", "runs:events"],
    };
    let sorted: BTreeSet<String> = scopes.iter().map(ToString::to_string).collect();
    sorted.into_iter().collect()
}

/// Normalizes one raw registry value into a [`TokenRegistryEntry`], or
/// `None` if `value` is not a JSON object.
#[must_use]
pub fn normalize_registry_entry(value: &Value) -> Option<TokenRegistryEntry> {
    let object = value.as_object()?;
    let organization = object
        .get("organization")
        .or_else(|| object.get("organization_name"))
        .or_else(|| object.get("organization_slug"))
        .and_then(Value::as_str)
        .unwrap_or("default")
        .trim()
        .to_string();
    let organization_slug = object
        .get("organization_slug")
        .and_then(Value::as_str)
        .filter(|slug| !slug.trim().is_empty())
        .unwrap_or(if organization.is_empty() { "default" } else { &organization })
        .trim()
        .to_string();
    let actor_role = object
        .get("actor_role")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .unwrap_or("qa_viewer")
        .to_string();

    let scopes = object
        .get("scopes")
        .and_then(Value::as_array)
        .map(|items| {
            let set: BTreeSet<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(ToString::to_string)
                .collect();
            set.into_iter().collect::<Vec<_>>()
        })
        .filter(|scopes| !scopes.is_empty())
        .unwrap_or_else(|| scopes_for_role(&actor_role));

    Some(TokenRegistryEntry {
        organization: if organization.is_empty() { organization_slug.clone() } else { organization },
        organization_slug,
        actor_role,
        scopes,
    })
}

/// Builds the static base registry from `default_token` and an optional raw
/// JSON object string (`*_API_TOKEN_REGISTRY`).
#[must_use]
pub fn load_token_registry(
    default_token: Option<&str>,
    registry_json: Option<&str>,
) -> HashMap<String, TokenRegistryEntry> {
    let mut registry = HashMap::new();
    if let Some(raw) = registry_json {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(entries)) => {
                for (token, value) in entries {
                    if let Some(entry) = normalize_registry_entry(&value) {
                        registry.insert(token, entry);
                    }
                }
            }
            Ok(_) => tracing::warn!("token registry JSON must be an object mapping tokens to metadata"),
            Err(err) => tracing::warn!(error = %err, "failed to parse token registry JSON; ignoring"),
        }
    }
    if let Some(token) = default_token {
        registry.entry(token.to_string()).or_insert_with(|| TokenRegistryEntry {
            organization: "default".to_string(),
            organization_slug: "default".to_string(),
            actor_role: "qa_runner".to_string(),
            scopes: scopes_for_role("qa_runner"),
        });
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::load_token_registry;
    use super::normalize_registry_entry;
    use super::scopes_for_role;

    #[test]
    fn qa_runner_scopes_are_sorted() {
        assert_eq!(scopes_for_role("qa_runner"), vec!["runs:create", "runs:events", "runs:read"]);
    }

    #[test]
    fn unknown_role_falls_back_to_viewer_scopes() {
        assert_eq!(scopes_for_role("made_up"), scopes_for_role("qa_viewer"));
    }

    #[test]
    fn normalize_fills_in_missing_scopes_from_role() {
        let value = serde_json::json!({"organization_slug": "acme-qa", "actor_role": "admin"});
        let entry = normalize_registry_entry(&value).unwrap();
        assert_eq!(entry.organization_slug, "acme-qa");
        assert!(entry.scopes.contains(&"runs:read:all".to_string()));
    }

    #[test]
    fn default_token_is_added_when_absent_from_registry_json() {
        let registry = load_token_registry(Some("secret-token"), None);
        assert!(registry.contains_key("secret-token"));
        assert_eq!(registry["secret-token"].organization_slug, "default");
    }

    #[test]
    fn wildcard_scope_allows_any_capability() {
        let entry = normalize_registry_entry(&serde_json::json!({"scopes": ["runs:*"]})).unwrap();
        assert!(entry.allows("runs:create"));
        assert!(entry.allows("runs:read:all"));
    }
}
