// crates/runforge-core/src/validation.rs
// ============================================================================
// Module: Runforge Intake Validation
// Description: Normalizes and validates `POST /runs` payloads.
// Purpose: Turn an untyped JSON body into a `CreateRunPayload`, collecting
//          every field error instead of failing on the first one.
// Dependencies: crate::{error, ids, run}, serde, serde_json, url
// ============================================================================

//! ## Overview
//! Mirrors the normalization rules an intake payload must satisfy: a valid
//! `target_url`, budgets that default to 30 minutes / 200 pages but must be
//! positive when supplied, a slug normalized from `organization_slug` or
//! `organization`, and credentials that are either fully absent or carry a
//! `secret_ref`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;
use crate::ids::Slug;
use crate::run::Budgets;
use crate::run::Credentials;

/// A field → message map describing why intake validation failed.
pub type FieldErrors = BTreeMap<String, String>;

/// The raw, untyped shape of a `POST /runs` body.
#[derive(Debug, Default, Deserialize)]
pub struct RawCreateRunPayload {
    /// Target URL to explore.
    #[serde(default)]
    pub target_url: Option<String>,
    /// Raw credential fields.
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
    /// Raw budget fields.
    #[serde(default)]
    pub budgets: Option<serde_json::Value>,
    /// Storage profile label.
    #[serde(default)]
    pub storage_profile: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
    /// Organization display name.
    #[serde(default)]
    pub organization: Option<String>,
    /// Caller-requested organization slug.
    #[serde(default)]
    pub organization_slug: Option<String>,
    /// Actor role.
    #[serde(default)]
    pub actor_role: Option<String>,
}

/// A fully validated, normalized `POST /runs` payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRunPayload {
    /// Target URL to explore.
    pub target_url: String,
    /// Normalized credentials.
    pub credentials: Credentials,
    /// Normalized budgets.
    pub budgets: Budgets,
    /// Storage profile label.
    pub storage_profile: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Organization display name.
    pub organization: String,
    /// Normalized organization slug.
    pub organization_slug: Slug,
    /// Actor role, defaulting to `"qa_runner"`.
    pub actor_role: String,
}

impl CreateRunPayload {
    /// Validates and normalizes a raw intake payload.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] with one entry per invalid field.
    pub fn from_raw(raw: RawCreateRunPayload) -> Result<Self, CoreError> {
        let mut errors = FieldErrors::new();

        let target_url = raw.target_url.unwrap_or_default();
        if target_url.is_empty() {
            errors.insert("target_url".to_string(), "target_url is required".to_string());
        } else if !is_valid_url(&target_url) {
            errors.insert(
                "target_url".to_string(),
                "target_url must include scheme and host".to_string(),
            );
        }

        let credentials = normalize_credentials(raw.credentials, &mut errors);

        let budgets = normalize_budgets(raw.budgets, &mut errors);

        let storage_profile = raw
            .storage_profile
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let tags = normalize_tags(raw.tags, &mut errors);

        let organization = raw
            .organization
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let slug_input = raw
            .organization_slug
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let organization_slug = match slug_input {
            Some(explicit) => Slug::normalize(&explicit),
            None if organization != "default" => Slug::normalize(&organization),
            None => Slug::normalize(Slug::DEFAULT),
        };

        let actor_role_raw = raw
            .actor_role
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        let actor_role = if actor_role_raw.is_empty() {
            "qa_runner".to_string()
        } else {
            actor_role_raw
        };

        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }

        Ok(Self {
            target_url,
            credentials,
            budgets,
            storage_profile,
            tags,
            organization,
            organization_slug,
            actor_role,
        })
    }
}

/// Returns `true` when `value` parses as a URL with both a scheme and a host.
fn is_valid_url(value: &str) -> bool {
    url::Url::parse(value)
        .is_ok_and(|parsed| !parsed.scheme().is_empty() && parsed.host().is_some())
}

/// Normalizes the raw `credentials` object, recording errors into `errors`.
fn normalize_credentials(
    raw: Option<serde_json::Value>,
    errors: &mut FieldErrors,
) -> Credentials {
    let Some(value) = raw else {
        return Credentials::default();
    };
    let object = match value {
        serde_json::Value::Null => return Credentials::default(),
        serde_json::Value::Object(map) => map,
        _ => {
            errors.insert("credentials".to_string(), "credentials must be an object".to_string());
            return Credentials::default();
        }
    };
    let non_empty_supplied = object.values().any(|entry| !entry.is_null());
    if !non_empty_supplied {
        return Credentials::default();
    }
    let username = object
        .get("username")
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    let secret_ref = object
        .get("secret_ref")
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    let credentials = Credentials { username, secret_ref };
    if credentials.is_empty() {
        errors.insert(
            "credentials.secret_ref".to_string(),
            "secret_ref required when credentials supplied".to_string(),
        );
    }
    credentials
}

/// Normalizes the raw `budgets` object, recording errors into `errors`.
fn normalize_budgets(raw: Option<serde_json::Value>, errors: &mut FieldErrors) -> Budgets {
    let default = Budgets::default();
    let object = match raw {
        None | Some(serde_json::Value::Null) => return default,
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            errors.insert("budgets".to_string(), "budgets must be an object".to_string());
            return default;
        }
    };
    let time_budget_minutes = object
        .get("time_budget_minutes")
        .and_then(coerce_u32)
        .unwrap_or(default.time_budget_minutes);
    let page_budget = object
        .get("page_budget")
        .and_then(coerce_u32)
        .unwrap_or(default.page_budget);
    if time_budget_minutes == 0 {
        errors.insert(
            "budgets.time_budget_minutes".to_string(),
            "must be > 0".to_string(),
        );
    }
    if page_budget == 0 {
        errors.insert("budgets.page_budget".to_string(), "must be > 0".to_string());
    }
    Budgets {
        time_budget_minutes,
        page_budget,
    }
}

/// Best-effort coercion of a JSON value to a non-negative integer.
fn coerce_u32(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    if let Some(n) = value.as_i64() {
        return u32::try_from(n).ok();
    }
    value.as_str().and_then(|s| s.parse::<u32>().ok())
}

/// Normalizes the raw `tags` array, recording an error if it isn't one.
fn normalize_tags(raw: Option<serde_json::Value>, errors: &mut FieldErrors) -> Vec<String> {
    match raw {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(_) => {
            errors.insert("tags".to_string(), "tags must be an array".to_string());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CreateRunPayload;
    use super::RawCreateRunPayload;
    use crate::error::CoreError;

    #[test]
    fn minimal_valid_payload_fills_in_defaults() {
        let raw = RawCreateRunPayload {
            target_url: Some("https://example.test".to_string()),
            ..Default::default()
        };
        let payload = CreateRunPayload::from_raw(raw).unwrap();
        assert_eq!(payload.organization_slug.as_str(), "default");
        assert_eq!(payload.actor_role, "qa_runner");
        assert_eq!(payload.budgets.time_budget_minutes, 30);
        assert_eq!(payload.budgets.page_budget, 200);
    }

    #[test]
    fn missing_target_url_is_a_validation_error() {
        let raw = RawCreateRunPayload::default();
        let err = CreateRunPayload::from_raw(raw).unwrap_err();
        match err {
            CoreError::Validation(fields) => {
                assert!(fields.contains_key("target_url"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn credentials_without_secret_ref_is_rejected() {
        let raw = RawCreateRunPayload {
            target_url: Some("https://example.test".to_string()),
            credentials: Some(serde_json::json!({"username": "alice"})),
            ..Default::default()
        };
        let err = CreateRunPayload::from_raw(raw).unwrap_err();
        match err {
            CoreError::Validation(fields) => {
                assert!(fields.contains_key("credentials.secret_ref"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn explicit_slug_is_normalized() {
        let raw = RawCreateRunPayload {
            target_url: Some("https://example.test".to_string()),
            organization_slug: Some("Acme QA".to_string()),
            ..Default::default()
        };
        let payload = CreateRunPayload::from_raw(raw).unwrap();
        assert_eq!(payload.organization_slug.as_str(), "acme-qa");
    }
}
