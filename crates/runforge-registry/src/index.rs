// crates/runforge-registry/src/index.rs
// ============================================================================
// Module: Runforge Run Index
// Description: The `run_index.json` mapping and its rebuild procedure.
// Purpose: Let the registry resolve a bare `run_id` to its tenant partition
//          without scanning the filesystem on every lookup.
// Dependencies: runforge-core::{CoreError, ids}, crate::paths, serde_json
// ============================================================================

//! ## Overview
//! The index is a flat JSON object, `run_id -> {organization,
//! organization_slug, actor_role}`, persisted at `<root>/run_index.json`.
//! [`rebuild_index`] walks every `<root>/<slug>/<run_id>/run_manifest.json`
//! (and, when `move_legacy` is set, every legacy `<root>/<run_id>/` left
//! over from before tenant partitioning) and rewrites the index from
//! scratch, so running it twice in a row is a no-op.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use runforge_core::CoreError;
use runforge_core::Run;

use crate::paths;

/// One `run_index.json` entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunIndexEntry {
    /// Organization display name.
    pub organization: String,
    /// Normalized organization slug; names the on-disk partition.
    pub organization_slug: String,
    /// Role of the actor that created the run.
    pub actor_role: String,
}

/// The full run index: `run_id -> RunIndexEntry`.
pub type RunIndex = BTreeMap<String, RunIndexEntry>;

/// Loads the run index from disk, returning an empty index if it doesn't exist yet.
///
/// # Errors
/// Returns [`CoreError::Internal`] if the file exists but cannot be read or parsed.
pub fn load_index(storage_root: &Path) -> Result<RunIndex, CoreError> {
    let path = paths::run_index_path(storage_root);
    if !path.exists() {
        return Ok(RunIndex::new());
    }
    let raw = fs::read_to_string(&path)?;
    let index: RunIndex = serde_json::from_str(&raw)?;
    Ok(index)
}

/// Persists `index` to `<root>/run_index.json`, pretty-printed.
///
/// # Errors
/// Returns [`CoreError::Internal`] if the file cannot be written.
pub fn save_index(storage_root: &Path, index: &RunIndex) -> Result<(), CoreError> {
    let path = paths::run_index_path(storage_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let rendered = serde_json::to_string_pretty(index)?;
    fs::write(path, rendered)?;
    Ok(())
}

/// Walks every manifest under `storage_root`, rewriting the run index from
/// scratch. When `move_legacy` is set, a run found directly at
/// `<root>/<run_id>/run_manifest.json` (i.e. predating tenant partitioning)
/// is moved into `<root>/<slug>/<run_id>/` before being indexed.
///
/// Idempotent: running this twice in a row produces the same index and
/// performs no further moves on the second pass.
///
/// # Errors
/// Returns [`CoreError::Internal`] on any I/O or parse failure encountered
/// while walking `storage_root`.
pub fn rebuild_index(storage_root: &Path, move_legacy: bool) -> Result<RunIndex, CoreError> {
    if move_legacy {
        migrate_legacy_runs(storage_root)?;
    }
    let mut index = RunIndex::new();
    if !storage_root.exists() {
        save_index(storage_root, &index)?;
        return Ok(index);
    }
    for tenant_entry in fs::read_dir(storage_root)? {
        let tenant_entry = tenant_entry?;
        if !tenant_entry.file_type()?.is_dir() {
            continue;
        }
        let tenant_name = tenant_entry.file_name();
        let Some(slug) = tenant_name.to_str() else {
            continue;
        };
        if slug == "_audit" {
            continue;
        }
        for run_entry in fs::read_dir(tenant_entry.path())? {
            let run_entry = run_entry?;
            if !run_entry.file_type()?.is_dir() {
                continue;
            }
            let manifest_path = paths::manifest_path(&run_entry.path());
            if !manifest_path.exists() {
                continue;
            }
            let raw = fs::read_to_string(&manifest_path)?;
            let run: Run = serde_json::from_str(&raw)?;
            index.insert(
                run.id.as_str().to_string(),
                RunIndexEntry {
                    organization: run.organization,
                    organization_slug: slug.to_string(),
                    actor_role: run.actor_role,
                },
            );
        }
    }
    save_index(storage_root, &index)?;
    Ok(index)
}

/// Moves any run found directly at `<root>/<run_id>/` into
/// `<root>/<slug>/<run_id>/`, reading the slug from its manifest.
fn migrate_legacy_runs(storage_root: &Path) -> Result<(), CoreError> {
    if !storage_root.exists() {
        return Ok(());
    }
    let mut legacy_dirs = Vec::new();
    for entry in fs::read_dir(storage_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let manifest_path = paths::manifest_path(&entry.path());
        if manifest_path.exists() {
            legacy_dirs.push(entry.path());
        }
    }
    for legacy_dir in legacy_dirs {
        let manifest_path = paths::manifest_path(&legacy_dir);
        let raw = fs::read_to_string(&manifest_path)?;
        let run: Run = serde_json::from_str(&raw)?;
        let target_dir = storage_root
            .join(run.organization_slug.as_str())
            .join(run.id.as_str());
        if target_dir == legacy_dir {
            continue;
        }
        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&legacy_dir, &target_dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::rebuild_index;
    use tempfile::tempdir;

    #[test]
    fn rebuild_on_empty_root_produces_empty_index() {
        let dir = tempdir().unwrap();
        let index = rebuild_index(dir.path(), false).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = rebuild_index(dir.path(), false).unwrap();
        let second = rebuild_index(dir.path(), false).unwrap();
        assert_eq!(first, second);
    }
}
