// crates/runforge-core/src/run.rs
// ============================================================================
// Module: Runforge Run Record
// Description: The persisted run manifest and its constituent value types.
// Purpose: Give the registry, workflow engine, and HTTP boundary one shared
//          shape for `run_manifest.json`.
// Dependencies: crate::{ids, status, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! `Run` is the in-memory and on-disk shape of `run_manifest.json`. Status
//! history is an ordered, append-only list of `(status, timestamp)` pairs;
//! the registry is responsible for coalescing consecutive duplicates before
//! appending.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::ids::RunId;
use crate::ids::Slug;
use crate::status::RunStatus;
use crate::time::Timestamp;

/// Optional credentials supplied at intake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username for the target application, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Opaque reference to a secret store entry holding the password/token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

impl Credentials {
    /// Returns `true` when neither `username` nor `secret_ref` is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.secret_ref.is_none()
    }
}

/// Time and page budgets for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budgets {
    /// Wall-clock minutes allotted to the run; always > 0.
    pub time_budget_minutes: u32,
    /// Maximum page count the run may visit; always > 0.
    pub page_budget: u32,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            time_budget_minutes: 30,
            page_budget: 200,
        }
    }
}

/// One entry in a run's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// The status recorded at `timestamp`.
    pub status: RunStatus,
    /// When this status was recorded.
    pub timestamp: Timestamp,
    /// Optional metadata attached to this transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// The full persisted manifest for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Stable run identifier.
    pub id: RunId,
    /// Target URL to explore.
    pub target_url: String,
    /// Optional login credentials.
    #[serde(default)]
    pub credentials: Credentials,
    /// Time and page budgets.
    pub budgets: Budgets,
    /// Storage profile label (opaque to the core).
    pub storage_profile: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Organization display name.
    pub organization: String,
    /// Normalized organization slug; determines on-disk partition.
    pub organization_slug: Slug,
    /// Role of the actor that created the run.
    pub actor_role: String,
    /// When the run was created.
    pub created_at: Timestamp,
    /// Current status; always equal to `status_history.last().status`.
    pub status: RunStatus,
    /// Ordered, append-only status history.
    pub status_history: Vec<StatusHistoryEntry>,
    /// Metadata attached to the most recent status transition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_metadata: Option<Map<String, Value>>,
}

impl Run {
    /// Appends `status` to the history, coalescing a trailing duplicate and
    /// keeping `self.status`/`self.status_metadata` in sync with the new
    /// last entry. Returns `false` when the entry was coalesced (no new
    /// history line was appended) so callers can decide whether to emit a
    /// `run.status` event.
    pub fn push_status(
        &mut self,
        status: RunStatus,
        timestamp: Timestamp,
        metadata: Option<Map<String, Value>>,
    ) -> bool {
        let is_duplicate = self
            .status_history
            .last()
            .is_some_and(|entry| entry.status == status);
        self.status = status;
        self.status_metadata.clone_from(&metadata);
        if is_duplicate {
            if let Some(last) = self.status_history.last_mut() {
                last.timestamp = timestamp;
                last.metadata = metadata;
            }
            false
        } else {
            self.status_history.push(StatusHistoryEntry {
                status,
                timestamp,
                metadata,
            });
            true
        }
    }
}
