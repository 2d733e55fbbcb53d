// crates/runforge-registry/src/audit.rs
// ============================================================================
// Module: Runforge Audit Log
// Description: Append-only JSONL audit trail with hashed actor identity.
// Purpose: Record every auth failure, scope denial, artifact download,
//          run mutation, and alert ingestion to one process-wide log.
// Dependencies: runforge-core::Timestamp, sha2, serde_json, std::sync::Mutex
// ============================================================================

//! ## Overview
//! Grounded on `decision-gate-mcp/src/audit.rs`'s sink-trait pattern and on
//! `gazeqa/audit.py`'s `AuditLogger`: one compact JSON line per event,
//! actor tokens reduced to the first 12 hex characters of their SHA-256
//! digest so the log never carries a usable credential.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use runforge_core::Timestamp;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// One audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: Timestamp,
    /// The action being audited, e.g. `"run.create"`, `"artifact.download"`.
    pub action: String,
    /// Outcome of the action: `"success"` or `"denied"`/`"error"`.
    pub status: String,
    /// Run the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Role of the acting principal, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<String>,
    /// Organization slug of the acting principal, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_slug: Option<String>,
    /// First 12 hex characters of SHA-256(token), if a token was presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_hash: Option<String>,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Starts building an audit event for `action`, defaulting to `status = "success"`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            action: action.into(),
            status: "success".to_string(),
            run_id: None,
            actor_role: None,
            organization_slug: None,
            token_hash: None,
            metadata: None,
        }
    }

    /// Overrides the default `"success"` status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Attaches a run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Attaches the principal's role and slug.
    #[must_use]
    pub fn with_principal(mut self, actor_role: impl Into<String>, organization_slug: impl Into<String>) -> Self {
        self.actor_role = Some(actor_role.into());
        self.organization_slug = Some(organization_slug.into());
        self
    }

    /// Hashes `token` and attaches the first 12 hex characters.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token_hash = Some(hash_token(token));
        self
    }

    /// Attaches free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Returns the first 12 hex characters of SHA-256(`token`).
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// A destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records `event`. Implementations must not panic; a logging failure
    /// is itself only logged, never propagated to the caller's request path.
    fn record(&self, event: AuditEvent);
}

/// Discards every event; used in tests and single-tenant dev mode.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Emits one `tracing::info!` record per event instead of writing a file;
/// useful for containerized deployments that collect stdout/stderr logs
/// rather than mounting a writable audit log path.
#[derive(Debug, Default)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: AuditEvent) {
        let Ok(line) = serde_json::to_string(&event) else {
            tracing::error!(action = %event.action, "failed to serialize audit event");
            return;
        };
        tracing::info!(target: "runforge_audit", "{line}");
    }
}

/// Writes one compact JSON line per event to a shared file, under a
/// process-wide lock (per spec.md §5's shared-resource policy).
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    /// Opens (creating parent directories as needed) the audit log at
    /// `<storage_root>/_audit/audit.log.jsonl`.
    ///
    /// # Errors
    /// Returns an I/O error if the parent directory cannot be created.
    pub fn new(storage_root: &Path) -> std::io::Result<Self> {
        let path = crate::paths::audit_log_path(storage_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Ok(mut line) = serde_json::to_string(&event) else {
            tracing::error!(action = %event.action, "failed to serialize audit event");
            return;
        };
        line.push('\n');
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = result {
            tracing::error!(path = %self.path.display(), error = %err, "failed to write audit log");
        }
    }
}
