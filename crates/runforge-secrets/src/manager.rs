// crates/runforge-secrets/src/manager.rs
// ============================================================================
// Module: Runforge Secrets Manager
// Description: Hot-reloads API tokens and signing keys from disk.
// Purpose: Let operators rotate bearer tokens and HMAC keys by editing a
//          file, without restarting the server.
// Dependencies: std::sync::Mutex, std::fs, crate::{tokens, signing}
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/security.py::SecretsManager`: three token sources are
//! layered by precedence (static base registry, then a single-token file
//! overlay, then a full-registry file overlay), each independently
//! mtime-gated so a file that has not changed since the last read is not
//! re-parsed. Signing keys come from an optional key file (one key per
//! line, newest first) which, when present, fully supersedes the
//! environment-configured primary key; the environment's previous keys are
//! still appended for any key not already in the file's list.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::signing::SigningKeySet;
use crate::tokens::load_token_registry;
use crate::tokens::normalize_registry_entry;
use crate::tokens::scopes_for_role;
use crate::tokens::TokenRegistryEntry;

/// Defaults applied to the single-token file's bearer token when no other
/// metadata is available for it.
#[derive(Debug, Clone)]
pub struct TokenFileDefaults {
    /// Organization display name.
    pub organization: String,
    /// Organization slug.
    pub organization_slug: String,
    /// Role the lone token authenticates as.
    pub actor_role: String,
}

impl Default for TokenFileDefaults {
    fn default() -> Self {
        Self {
            organization: "default".to_string(),
            organization_slug: "default".to_string(),
            actor_role: "qa_runner".to_string(),
        }
    }
}

/// Construction parameters for [`SecretsManager`].
#[derive(Debug, Clone, Default)]
pub struct SecretsManagerConfig {
    /// A single always-valid token, granted `qa_runner` defaults if no
    /// registry entry names it explicitly.
    pub default_token: Option<String>,
    /// Raw JSON object mapping tokens to registry entries.
    pub registry_json: Option<String>,
    /// Path to a JSON file overlaying the static registry, hot-reloaded.
    pub registry_file: Option<PathBuf>,
    /// Path to a file containing a single bearer token, hot-reloaded.
    pub token_file: Option<PathBuf>,
    /// Metadata assigned to the token read from `token_file`.
    pub token_file_defaults: TokenFileDefaults,
    /// The signing key used until `signing_key_file` is configured.
    pub signing_key: Option<String>,
    /// Previous signing keys still accepted for verification.
    pub signing_key_previous: Vec<String>,
    /// Path to a file of newline-separated signing keys, hot-reloaded.
    pub signing_key_file: Option<PathBuf>,
}

struct FileSource<T> {
    path: PathBuf,
    mtime: Option<SystemTime>,
    value: T,
}

/// Hot-reloads the token registry and signing key ring from configuration
/// and, optionally, disk.
pub struct SecretsManager {
    base_registry: HashMap<String, TokenRegistryEntry>,
    registry_file: Mutex<Option<FileSource<HashMap<String, TokenRegistryEntry>>>>,
    token_file: Mutex<Option<FileSource<HashMap<String, TokenRegistryEntry>>>>,
    token_file_defaults: TokenFileDefaults,
    primary_signing_key: Option<String>,
    previous_signing_keys: Vec<String>,
    signing_key_file: Mutex<Option<FileSource<Vec<String>>>>,
}

impl SecretsManager {
    /// Builds a manager from `config`, loading the static base registry
    /// immediately. File-backed sources are read lazily on first access.
    #[must_use]
    pub fn new(config: SecretsManagerConfig) -> Self {
        let base_registry = load_token_registry(config.default_token.as_deref(), config.registry_json.as_deref());
        let previous_signing_keys: Vec<String> =
            config.signing_key_previous.into_iter().map(|key| key.trim().to_string()).filter(|key| !key.is_empty()).collect();

        Self {
            base_registry,
            registry_file: Mutex::new(config.registry_file.map(|path| FileSource { path, mtime: None, value: HashMap::new() })),
            token_file: Mutex::new(config.token_file.map(|path| FileSource { path, mtime: None, value: HashMap::new() })),
            token_file_defaults: config.token_file_defaults,
            primary_signing_key: config.signing_key,
            previous_signing_keys,
            signing_key_file: Mutex::new(config.signing_key_file.map(|path| FileSource { path, mtime: None, value: Vec::new() })),
        }
    }

    /// Returns the composed token registry: base, overlaid by the
    /// single-token file, overlaid by the full registry file.
    #[must_use]
    pub fn get_token_registry(&self) -> HashMap<String, TokenRegistryEntry> {
        let mut registry = self.base_registry.clone();

        if let Some(token_entry) = self.refresh_token_file() {
            registry.extend(token_entry);
        }
        if let Some(override_entries) = self.refresh_registry_file() {
            registry.extend(override_entries);
        }
        registry
    }

    /// Returns the current signing key ring: the key file's keys if
    /// present, else the configured primary key, followed by any
    /// configured previous keys not already present.
    #[must_use]
    pub fn get_signing_keys(&self) -> SigningKeySet {
        let file_keys = self.refresh_signing_key_file();

        let mut keys: Vec<String> = Vec::new();
        if !file_keys.is_empty() {
            keys.extend(file_keys);
        } else if let Some(primary) = &self.primary_signing_key {
            keys.push(primary.clone());
        }
        for key in &self.previous_signing_keys {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        let primary = keys.first().cloned();
        SigningKeySet { primary, all_keys: keys }
    }

    fn refresh_token_file(&self) -> Option<HashMap<String, TokenRegistryEntry>> {
        let mut guard = self.token_file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let source = guard.as_mut()?;
        match fs::metadata(&source.path).and_then(|meta| meta.modified()) {
            Ok(mtime) => {
                if source.mtime != Some(mtime) {
                    source.value = load_token_file_entry(&source.path, &self.token_file_defaults);
                    source.mtime = Some(mtime);
                }
            }
            Err(_) => {
                if !source.value.is_empty() {
                    tracing::warn!(path = %source.path.display(), "token file disappeared");
                    source.value = HashMap::new();
                }
                source.mtime = None;
            }
        }
        Some(source.value.clone())
    }

    fn refresh_registry_file(&self) -> Option<HashMap<String, TokenRegistryEntry>> {
        let mut guard = self.registry_file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let source = guard.as_mut()?;
        match fs::metadata(&source.path).and_then(|meta| meta.modified()) {
            Ok(mtime) => {
                if source.mtime != Some(mtime) {
                    source.value = load_registry_override(&source.path);
                    source.mtime = Some(mtime);
                }
            }
            Err(_) => {
                if !source.value.is_empty() {
                    tracing::warn!(path = %source.path.display(), "token registry file disappeared");
                    source.value = HashMap::new();
                }
                source.mtime = None;
            }
        }
        Some(source.value.clone())
    }

    fn refresh_signing_key_file(&self) -> Vec<String> {
        let mut guard = self.signing_key_file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(source) = guard.as_mut() else { return Vec::new() };
        match fs::metadata(&source.path).and_then(|meta| meta.modified()) {
            Ok(mtime) => {
                if source.mtime != Some(mtime) {
                    source.value = load_signing_key_file(&source.path);
                    source.mtime = Some(mtime);
                }
            }
            Err(_) => {
                if !source.value.is_empty() {
                    tracing::warn!(path = %source.path.display(), "signing key file disappeared");
                    source.value = Vec::new();
                }
                source.mtime = None;
            }
        }
        source.value.clone()
    }
}

fn load_registry_override(path: &Path) -> HashMap<String, TokenRegistryEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read token registry file");
            return HashMap::new();
        }
    };
    let parsed: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "invalid JSON in token registry file");
            return HashMap::new();
        }
    };
    let Some(entries) = parsed.as_object() else {
        tracing::error!(path = %path.display(), "token registry file must contain a JSON object");
        return HashMap::new();
    };
    entries
        .iter()
        .filter_map(|(token, value)| normalize_registry_entry(value).map(|entry| (token.clone(), entry)))
        .collect()
}

fn load_token_file_entry(path: &Path, defaults: &TokenFileDefaults) -> HashMap<String, TokenRegistryEntry> {
    let token = match fs::read_to_string(path) {
        Ok(raw) => raw.trim().to_string(),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read token file");
            return HashMap::new();
        }
    };
    if token.is_empty() {
        return HashMap::new();
    }
    let entry = TokenRegistryEntry {
        organization: defaults.organization.clone(),
        organization_slug: defaults.organization_slug.clone(),
        actor_role: defaults.actor_role.clone(),
        scopes: scopes_for_role(&defaults.actor_role),
    };
    let mut map = HashMap::with_capacity(1);
    map.insert(token, entry);
    map
}

fn load_signing_key_file(path: &Path) -> Vec<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read signing key file");
            return Vec::new();
        }
    };
    let mut seen = std::collections::HashSet::new();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert((*line).to_string()))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::SecretsManager;
    use super::SecretsManagerConfig;
    use super::TokenFileDefaults;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn default_token_gets_qa_runner_defaults() {
        let manager = SecretsManager::new(SecretsManagerConfig {
            default_token: Some("tok-1".to_string()),
            ..Default::default()
        });
        let registry = manager.get_token_registry();
        assert_eq!(registry["tok-1"].actor_role, "qa_runner");
    }

    #[test]
    fn registry_file_overlay_wins_over_base_registry() {
        let dir = tempdir().unwrap();
        let registry_path = dir.path().join("registry.json");
        fs::write(&registry_path, r#"{"tok-1": {"actor_role": "admin"}}"#).unwrap();

        let manager = SecretsManager::new(SecretsManagerConfig {
            default_token: Some("tok-1".to_string()),
            registry_file: Some(registry_path),
            ..Default::default()
        });
        let registry = manager.get_token_registry();
        assert_eq!(registry["tok-1"].actor_role, "admin");
    }

    #[test]
    fn token_file_is_picked_up_after_mtime_change() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.txt");
        fs::write(&token_path, "first-token").unwrap();

        let manager = SecretsManager::new(SecretsManagerConfig {
            token_file: Some(token_path.clone()),
            token_file_defaults: TokenFileDefaults::default(),
            ..Default::default()
        });
        assert!(manager.get_token_registry().contains_key("first-token"));

        thread::sleep(Duration::from_millis(10));
        fs::write(&token_path, "second-token").unwrap();
        let registry = manager.get_token_registry();
        assert!(registry.contains_key("second-token"));
        assert!(!registry.contains_key("first-token"));
    }

    #[test]
    fn token_file_disappearing_drops_its_entry() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.txt");
        fs::write(&token_path, "only-token").unwrap();

        let manager = SecretsManager::new(SecretsManagerConfig { token_file: Some(token_path.clone()), ..Default::default() });
        assert!(manager.get_token_registry().contains_key("only-token"));

        fs::remove_file(&token_path).unwrap();
        assert!(!manager.get_token_registry().contains_key("only-token"));
    }

    #[test]
    fn signing_key_file_supersedes_env_primary_and_appends_previous() {
        let dir = tempdir().unwrap();
        let key_path = dir.path().join("keys.txt");
        fs::write(&key_path, "file-key-1\nfile-key-2\n").unwrap();

        let manager = SecretsManager::new(SecretsManagerConfig {
            signing_key: Some("env-primary".to_string()),
            signing_key_previous: vec!["env-previous".to_string()],
            signing_key_file: Some(key_path),
            ..Default::default()
        });
        let keys = manager.get_signing_keys();
        assert_eq!(keys.primary.as_deref(), Some("file-key-1"));
        assert_eq!(keys.all_keys, vec!["file-key-1", "file-key-2", "env-previous"]);
    }

    #[test]
    fn without_a_key_file_env_primary_and_previous_compose() {
        let manager = SecretsManager::new(SecretsManagerConfig {
            signing_key: Some("env-primary".to_string()),
            signing_key_previous: vec!["env-previous".to_string(), "env-primary".to_string()],
            ..Default::default()
        });
        let keys = manager.get_signing_keys();
        assert_eq!(keys.primary.as_deref(), Some("env-primary"));
        assert_eq!(keys.all_keys, vec!["env-primary", "env-previous"]);
    }

    #[test]
    fn no_signing_key_configured_yields_no_primary() {
        let manager = SecretsManager::new(SecretsManagerConfig::default());
        let keys = manager.get_signing_keys();
        assert!(keys.primary.is_none());
        assert!(keys.all_keys.is_empty());
    }
}
