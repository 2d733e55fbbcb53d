// crates/runforge-registry/src/registry.rs
// ============================================================================
// Module: Runforge Run Registry
// Description: Creates/reads/updates runs, appends events, notifies
//              listeners, and maintains the run index.
// Purpose: The single writer of run state on disk; every other component
//          (workflow engine, HTTP boundary) goes through this type.
// Dependencies: crate::{audit, index, listener, paths}, runforge-core
// ============================================================================

//! ## Overview
//! `RunRegistry` implements spec.md §4.1 end to end: `create_run` allocates
//! a run id, writes the initial manifest/history/event, and updates the
//! index; `update_status`/`record_checkpoint` append to the relevant JSONL
//! files under a per-run lock; `register_listener`/`unregister_listener`
//! delegate to [`crate::listener::ListenerRegistry`].

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rand::RngCore;
use runforge_core::CoreError;
use runforge_core::CreateRunPayload;
use runforge_core::Event;
use runforge_core::Run;
use runforge_core::RunId;
use runforge_core::RunStatus;
use runforge_core::Slug;
use runforge_core::Timestamp;
use runforge_core::run::StatusHistoryEntry;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::index::RunIndex;
use crate::index::RunIndexEntry;
use crate::index::load_index;
use crate::index::rebuild_index as rebuild_index_on_disk;
use crate::index::save_index;
use crate::listener::ListenerId;
use crate::listener::ListenerRegistry;
use crate::paths;

/// Summary entry returned by [`RunRegistry::list_runs`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    /// Run identifier.
    pub id: String,
    /// Organization slug (on-disk partition).
    pub slug: String,
    /// Organization display name.
    pub organization: String,
    /// Role of the actor that created the run.
    pub actor_role: String,
}

/// Per-run append lock, keyed by run id, so concurrent writers to the same
/// run's files serialize while writers to different runs do not contend.
#[derive(Default)]
struct RunLocks {
    table: Mutex<HashMap<RunId, Arc<Mutex<()>>>>,
}

impl RunLocks {
    fn lock_for(&self, run_id: &RunId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        table.entry(run_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// The durable, multi-tenant run registry.
pub struct RunRegistry {
    storage_root: PathBuf,
    index: Mutex<RunIndex>,
    run_locks: RunLocks,
    listeners: ListenerRegistry,
    audit: Arc<dyn AuditSink>,
}

impl RunRegistry {
    /// Opens the registry rooted at `storage_root`, loading (or creating)
    /// the run index.
    ///
    /// # Errors
    /// Returns [`CoreError::Internal`] if the index exists but cannot be
    /// parsed, or if `storage_root` cannot be created.
    pub fn open(storage_root: impl Into<PathBuf>, audit: Arc<dyn AuditSink>) -> Result<Self, CoreError> {
        let storage_root = storage_root.into();
        fs::create_dir_all(&storage_root)?;
        let index = load_index(&storage_root)?;
        Ok(Self {
            storage_root,
            index: Mutex::new(index),
            run_locks: RunLocks::default(),
            listeners: ListenerRegistry::new(),
            audit,
        })
    }

    /// Returns the storage root this registry is rooted at.
    #[must_use]
    pub fn storage_root(&self) -> &std::path::Path {
        &self.storage_root
    }

    /// Returns the audit sink backing this registry, for callers (the HTTP
    /// boundary's unauthenticated routes) that need to record an audit
    /// entry without going through a registry-mutating method.
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Validates and persists a new run, returning its manifest.
    ///
    /// # Errors
    /// Returns [`CoreError::Internal`] on I/O failure while writing the
    /// initial manifest, summary, history, or event files.
    pub fn create_run(&self, payload: CreateRunPayload) -> Result<Run, CoreError> {
        let run_id = generate_run_id();
        let now = Timestamp::now();
        let slug = payload.organization_slug.clone();
        let run_dir = paths::run_dir(&self.storage_root, &slug, &run_id);
        fs::create_dir_all(&run_dir)?;
        fs::create_dir_all(run_dir.join("temporal"))?;
        fs::create_dir_all(run_dir.join("artifacts"))?;
        fs::create_dir_all(run_dir.join("observability"))?;

        let mut run = Run {
            id: run_id.clone(),
            target_url: payload.target_url,
            credentials: payload.credentials,
            budgets: payload.budgets,
            storage_profile: payload.storage_profile,
            tags: payload.tags,
            organization: payload.organization,
            organization_slug: slug.clone(),
            actor_role: payload.actor_role,
            created_at: now,
            status: RunStatus::Pending,
            status_history: Vec::new(),
            status_metadata: None,
        };
        run.push_status(RunStatus::Pending, now, None);
        run.push_status(RunStatus::Running, now, None);

        self.write_manifest(&run_dir, &run)?;

        {
            let mut index = self.index.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            index.insert(
                run_id.as_str().to_string(),
                RunIndexEntry {
                    organization: run.organization.clone(),
                    organization_slug: slug.as_str().to_string(),
                    actor_role: run.actor_role.clone(),
                },
            );
            save_index(&self.storage_root, &index)?;
        }

        self.append_event(&run_dir, Event::new("run.created", run_id.clone()))?;

        self.audit.record(
            AuditEvent::new("run.create")
                .with_run_id(run_id.as_str())
                .with_principal(run.actor_role.clone(), slug.as_str()),
        );

        Ok(run)
    }

    /// Reads a run's full manifest.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown.
    pub fn get_run(&self, run_id: &RunId) -> Result<Run, CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        self.read_manifest(&run_dir)
    }

    /// Returns the index entry (organization, slug, actor role) for a run.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown.
    pub fn get_run_metadata(&self, run_id: &RunId) -> Result<RunIndexEntry, CoreError> {
        let index = self.index.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        index
            .get(run_id.as_str())
            .cloned()
            .ok_or_else(|| CoreError::NotFound(run_id.as_str().to_string()))
    }

    /// Lists every known run, sorted by id.
    ///
    /// # Errors
    /// Returns [`CoreError::Internal`] if a manifest fails to parse.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>, CoreError> {
        let index = self.index.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut summaries: Vec<RunSummary> = index
            .iter()
            .map(|(id, entry)| RunSummary {
                id: id.clone(),
                slug: entry.organization_slug.clone(),
                organization: entry.organization.clone(),
                actor_role: entry.actor_role.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// Returns a run's status history.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown.
    pub fn get_status_history(&self, run_id: &RunId) -> Result<Vec<StatusHistoryEntry>, CoreError> {
        Ok(self.get_run(run_id)?.status_history)
    }

    /// Returns every event recorded for a run, in append order.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown, or
    /// [`CoreError::Internal`] if `events.jsonl` fails to parse.
    pub fn get_run_events(&self, run_id: &RunId) -> Result<Vec<Event>, CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        read_jsonl(&paths::events_path(&run_dir))
    }

    /// Resolves `relative` against a run's directory, rejecting traversal.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown, or
    /// [`CoreError::InvalidPath`] if `relative` escapes the run directory.
    pub fn get_artifact_path(&self, run_id: &RunId, relative: &str) -> Result<PathBuf, CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        paths::resolve_within(&run_dir, relative)
    }

    /// Returns a run's on-disk directory, for callers (the workflow engine's
    /// activities) that need to write artifacts directly rather than through
    /// [`RunRegistry::get_artifact_path`].
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown.
    pub fn run_directory(&self, run_id: &RunId) -> Result<PathBuf, CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        Ok(run_dir)
    }

    /// Appends a status transition, updates the manifest/summary, appends a
    /// `run.status` event, and notifies listeners.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown, or
    /// [`CoreError::Internal`] on I/O failure.
    pub fn update_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        metadata: Option<Map<String, Value>>,
    ) -> Result<(), CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        let lock = self.run_locks.lock_for(run_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut run = self.read_manifest(&run_dir)?;
        let now = Timestamp::now();
        let appended = run.push_status(status, now, metadata.clone());
        self.write_manifest(&run_dir, &run)?;

        if appended {
            let mut fields = metadata.unwrap_or_default();
            fields.insert("status".to_string(), Value::String(status.to_string()));
            self.append_event_locked(&run_dir, Event::with_fields("run.status", run_id.clone(), fields))?;
        }
        Ok(())
    }

    /// Appends one checkpoint line to `temporal/checkpoints.jsonl`.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] if `run_id` is unknown, or
    /// [`CoreError::Internal`] on I/O failure.
    pub fn record_checkpoint(
        &self,
        run_id: &RunId,
        name: &str,
        details: Option<Map<String, Value>>,
    ) -> Result<(), CoreError> {
        let (run_dir, _) = self.locate(run_id)?;
        let lock = self.run_locks.lock_for(run_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut record = details.unwrap_or_default();
        record.insert("name".to_string(), Value::String(name.to_string()));
        record.insert(
            "timestamp".to_string(),
            Value::String(
                Timestamp::now()
                    .to_rfc3339()
                    .map_err(|err| CoreError::Internal(err.to_string()))?,
            ),
        );
        append_jsonl(&paths::checkpoints_path(&run_dir), &Value::Object(record))
    }

    /// Registers a new SSE-style listener for `run_id`.
    #[must_use]
    pub fn register_listener(&self, run_id: RunId) -> (ListenerId, UnboundedReceiver<Event>) {
        self.listeners.register(run_id)
    }

    /// Removes a previously registered listener.
    pub fn unregister_listener(&self, run_id: &RunId, id: ListenerId) {
        self.listeners.unregister(run_id, id);
    }

    /// Rebuilds the run index from disk. See [`crate::index::rebuild_index`].
    ///
    /// # Errors
    /// Returns [`CoreError::Internal`] on I/O failure while walking the tree.
    pub fn rebuild_index(&self, move_legacy: bool) -> Result<(), CoreError> {
        let rebuilt = rebuild_index_on_disk(&self.storage_root, move_legacy)?;
        let mut index = self.index.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *index = rebuilt;
        Ok(())
    }

    /// Looks up a run's directory via the index.
    fn locate(&self, run_id: &RunId) -> Result<(PathBuf, RunIndexEntry), CoreError> {
        let entry = self.get_run_metadata(run_id)?;
        let slug = Slug::from_raw(entry.organization_slug.clone());
        let run_dir = paths::run_dir(&self.storage_root, &slug, run_id);
        Ok((run_dir, entry))
    }

    /// Appends an event without acquiring the per-run lock; callers that
    /// already hold it (e.g. [`RunRegistry::update_status`]) use this.
    fn append_event_locked(&self, run_dir: &std::path::Path, event: Event) -> Result<(), CoreError> {
        append_jsonl(&paths::events_path(run_dir), &serde_json::to_value(&event)?)?;
        self.listeners.notify(&event);
        Ok(())
    }

    /// Appends an event, acquiring the run's lock first.
    fn append_event(&self, run_dir: &std::path::Path, event: Event) -> Result<(), CoreError> {
        let lock = self.run_locks.lock_for(&event.run_id);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.append_event_locked(run_dir, event)
    }

    /// Reads and parses `run_manifest.json` from `run_dir`.
    fn read_manifest(&self, run_dir: &std::path::Path) -> Result<Run, CoreError> {
        let raw = fs::read_to_string(paths::manifest_path(run_dir))
            .map_err(|_| CoreError::NotFound(run_dir.display().to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes `run_manifest.json`, `run_summary.json`, and
    /// `status_history.json` for `run`.
    fn write_manifest(&self, run_dir: &std::path::Path, run: &Run) -> Result<(), CoreError> {
        fs::write(
            paths::manifest_path(run_dir),
            serde_json::to_string_pretty(run)?,
        )?;
        fs::write(
            paths::summary_path(run_dir),
            serde_json::to_string_pretty(&summary_of(run))?,
        )?;
        fs::write(
            paths::status_history_path(run_dir),
            serde_json::to_string_pretty(&run.status_history)?,
        )?;
        Ok(())
    }
}

/// A small, denormalized summary mirrored alongside the full manifest.
#[derive(Debug, serde::Serialize)]
struct RunSummaryFile<'a> {
    id: &'a str,
    status: RunStatus,
    target_url: &'a str,
    organization_slug: &'a str,
    created_at: Timestamp,
}

fn summary_of(run: &Run) -> RunSummaryFile<'_> {
    RunSummaryFile {
        id: run.id.as_str(),
        status: run.status,
        target_url: &run.target_url,
        organization_slug: run.organization_slug.as_str(),
        created_at: run.created_at,
    }
}

/// Generates a `RUN-<12 uppercase hex>` identifier from 6 random bytes.
fn generate_run_id() -> RunId {
    let mut bytes = [0_u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    RunId::from_hex_bytes(bytes)
}

/// Appends one compact JSON line, newline-terminated, to `path`.
fn append_jsonl(path: &std::path::Path, value: &Value) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Reads every line of a JSONL file as `T`, returning an empty vec if the
/// file does not exist yet.
fn read_jsonl<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<Vec<T>, CoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(CoreError::from))
        .collect()
}
