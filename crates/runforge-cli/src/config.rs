// crates/runforge-cli/src/config.rs
// ============================================================================
// Module: Runforge CLI Configuration
// Description: Resolves server configuration from environment variables and
//              an optional `RUNFORGE_CONFIG` TOML file.
// Purpose: Give `serve` one place to turn spec.md §6's `*_`-prefixed
//          environment variables into a `runforge_server::ServerConfig`.
// Dependencies: runforge-secrets, runforge-server, toml, serde
// ============================================================================

//! ## Overview
//! Grounded on `decision-gate-mcp`'s `DecisionGateConfig::load`: a TOML file
//! supplies defaults, and every recognized environment variable overrides
//! the corresponding field when present. Every variable is read under the
//! `RUNFORGE_` prefix spec.md §6 describes as `*_`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use runforge_secrets::SecretsManagerConfig;
use runforge_secrets::TokenFileDefaults;
use runforge_server::CorsConfig;
use runforge_server::TlsConfig;
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "RUNFORGE";

/// File-level defaults, overridden field-by-field by environment variables.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    storage_root: Option<String>,
    api_token: Option<String>,
    api_token_registry: Option<String>,
    token_registry_file: Option<String>,
    api_token_file: Option<String>,
    signing_key: Option<String>,
    signing_key_previous: Option<String>,
    signing_key_file: Option<String>,
    signing_ttl: Option<i64>,
    allowed_origins: Option<String>,
    cors_allow_credentials: Option<bool>,
    cors_allow_methods: Option<String>,
    cors_allow_headers: Option<String>,
    cors_allow_max_age: Option<u64>,
    alert_webhook_token: Option<String>,
    tls_certfile: Option<String>,
    tls_keyfile: Option<String>,
    worker_count: Option<usize>,
    audit_sink: Option<String>,
}

/// Which [`runforge_registry::AuditSink`] implementation `serve` wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSinkKind {
    /// Append JSONL events under `<storage_root>/_audit/audit.log.jsonl`.
    File,
    /// Emit one `tracing::info!` record per event instead of writing a file.
    Stderr,
}

/// A fully resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Address the HTTP boundary binds.
    pub bind: SocketAddr,
    /// Directory run partitions are stored under.
    pub storage_root: PathBuf,
    /// Secrets manager configuration.
    pub secrets: SecretsManagerConfig,
    /// CORS policy.
    pub cors: CorsConfig,
    /// Alert-webhook static bearer token.
    pub alert_webhook_token: Option<String>,
    /// TLS material, if HTTPS is desired.
    pub tls: Option<TlsConfig>,
    /// Lifetime of a freshly signed artifact download URL, in seconds.
    pub signing_ttl_seconds: i64,
    /// Number of executor pool workers.
    pub worker_count: usize,
    /// Which audit sink implementation to wire up.
    pub audit_sink: AuditSinkKind,
}

/// Failures resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `RUNFORGE_CONFIG` file could not be read.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The `RUNFORGE_CONFIG` file is not valid TOML.
    #[error("invalid config file {path}: {source}")]
    FileParse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// `RUNFORGE_API_HOST`/`RUNFORGE_API_PORT` did not form a valid address.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),
}

/// Resolves a [`CliConfig`] from `RUNFORGE_CONFIG` (if set) overlaid with
/// every recognized `RUNFORGE_*` environment variable.
///
/// # Errors
/// Returns [`ConfigError`] if a configured file cannot be read/parsed, or
/// if the resolved host/port do not form a valid socket address.
pub fn load() -> Result<CliConfig, ConfigError> {
    let file = load_file_config()?;
    resolve(file)
}

fn load_file_config() -> Result<FileConfig, ConfigError> {
    let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG")) else {
        return Ok(FileConfig::default());
    };
    let contents =
        std::fs::read_to_string(&path).map_err(|source| ConfigError::FileRead { path: path.clone(), source })?;
    toml::from_str(&contents).map_err(|source| ConfigError::FileParse { path, source })
}

fn env(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn comma_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(str::to_string).collect()
}

fn resolve(file: FileConfig) -> Result<CliConfig, ConfigError> {
    let host = env("API_HOST").or(file.host).unwrap_or_else(|| "127.0.0.1".to_string());
    let port = env("API_PORT").and_then(|value| value.parse().ok()).or(file.port).unwrap_or(8080);
    let bind: SocketAddr =
        format!("{host}:{port}").parse().map_err(|_| ConfigError::InvalidBindAddress(format!("{host}:{port}")))?;

    let storage_root =
        env("STORAGE_ROOT").or(file.storage_root).unwrap_or_else(|| "artifacts/runs".to_string()).into();

    let signing_key_previous = env("SIGNING_KEY_PREVIOUS")
        .or(file.signing_key_previous)
        .map(|value| comma_list(&value))
        .unwrap_or_default();

    let secrets = SecretsManagerConfig {
        default_token: env("API_TOKEN").or(file.api_token),
        registry_json: env("API_TOKEN_REGISTRY").or(file.api_token_registry),
        registry_file: env("TOKEN_REGISTRY_FILE").or(file.token_registry_file).map(PathBuf::from),
        token_file: env("API_TOKEN_FILE").or(file.api_token_file).map(PathBuf::from),
        token_file_defaults: TokenFileDefaults::default(),
        signing_key: env("SIGNING_KEY").or(file.signing_key),
        signing_key_previous,
        signing_key_file: env("SIGNING_KEY_FILE").or(file.signing_key_file).map(PathBuf::from),
    };

    let allowed_origins = env("ALLOWED_ORIGINS").or(file.allowed_origins).map(|value| comma_list(&value)).unwrap_or_default();
    let cors = CorsConfig {
        allowed_origins,
        allow_credentials: env("CORS_ALLOW_CREDENTIALS")
            .and_then(|value| value.parse().ok())
            .or(file.cors_allow_credentials)
            .unwrap_or(false),
        allow_methods: env("CORS_ALLOW_METHODS").or(file.cors_allow_methods).map(|value| comma_list(&value)).unwrap_or_default(),
        allow_headers: env("CORS_ALLOW_HEADERS").or(file.cors_allow_headers).map(|value| comma_list(&value)).unwrap_or_default(),
        max_age_seconds: env("CORS_ALLOW_MAX_AGE").and_then(|value| value.parse().ok()).or(file.cors_allow_max_age),
    };

    let tls_cert = env("TLS_CERTFILE").or(file.tls_certfile);
    let tls_key = env("TLS_KEYFILE").or(file.tls_keyfile);
    let tls = match (tls_cert, tls_key) {
        (Some(cert_path), Some(key_path)) => Some(TlsConfig { cert_path, key_path }),
        _ => None,
    };

    Ok(CliConfig {
        bind,
        storage_root,
        secrets,
        cors,
        alert_webhook_token: env("ALERT_WEBHOOK_TOKEN").or(file.alert_webhook_token),
        tls,
        signing_ttl_seconds: env("SIGNING_TTL").and_then(|value| value.parse().ok()).or(file.signing_ttl).unwrap_or(3600),
        worker_count: env("WORKER_COUNT").and_then(|value| value.parse().ok()).or(file.worker_count).unwrap_or(4),
        audit_sink: match env("AUDIT_SINK").or(file.audit_sink).as_deref() {
            Some("stderr") => AuditSinkKind::Stderr,
            _ => AuditSinkKind::File,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::comma_list;
    use super::resolve;
    use super::AuditSinkKind;
    use super::FileConfig;

    #[test]
    fn comma_list_trims_and_drops_empties() {
        assert_eq!(comma_list("a, b ,, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn defaults_resolve_without_any_environment() {
        let config = resolve(FileConfig::default()).unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.worker_count, 4);
        assert!(config.tls.is_none());
        assert_eq!(config.audit_sink, AuditSinkKind::File);
    }

    #[test]
    fn audit_sink_file_value_selects_stderr() {
        let config = resolve(FileConfig { audit_sink: Some("stderr".to_string()), ..FileConfig::default() }).unwrap();
        assert_eq!(config.audit_sink, AuditSinkKind::Stderr);
    }
}
