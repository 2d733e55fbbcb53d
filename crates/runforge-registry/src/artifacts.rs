// crates/runforge-registry/src/artifacts.rs
// ============================================================================
// Module: Runforge Artifact Manifest Builder
// Description: Walks a run directory and emits a stable (path, size, hash)
//              index sorted by path.
// Purpose: Give `GET /runs/{id}/artifacts` and the runpack consumers one
//          deterministic artifact listing.
// Dependencies: runforge-core::{hashing, Timestamp}, crate::paths, std::fs
// ============================================================================

//! ## Overview
//! Implements the "Artifact Manifest Builder" collaborator contract from
//! spec.md §6: `(storage_root, run_id, org_slug) -> {run_id, generated_at,
//! entries[{path, size, sha256}]}`, entries sorted by path. Grounded on
//! `decision-gate-core/src/core/runpack.rs`'s `ArtifactRecord`/`FileHashEntry`
//! shape, narrowed to the fields this service actually needs.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use runforge_core::CoreError;
use runforge_core::HashDigest;
use runforge_core::Timestamp;
use runforge_core::hashing::hash_bytes;
use serde::Serialize;

/// One file indexed in a run's artifact manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    /// Path relative to the run directory, using `/` separators.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// SHA-256 digest of the file contents.
    pub sha256: HashDigest,
}

/// The artifact manifest for a single run.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactManifest {
    /// The run this manifest describes.
    pub run_id: String,
    /// When this manifest was generated.
    pub generated_at: Timestamp,
    /// Entries sorted by `path`.
    pub entries: Vec<ArtifactEntry>,
}

/// Walks `run_dir` recursively and builds an [`ArtifactManifest`] for `run_id`.
///
/// # Errors
/// Returns [`CoreError::Internal`] on any I/O failure while walking the tree.
pub fn build_manifest(run_dir: &Path, run_id: &str) -> Result<ArtifactManifest, CoreError> {
    let mut entries = Vec::new();
    if run_dir.exists() {
        walk(run_dir, run_dir, &mut entries)?;
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ArtifactManifest {
        run_id: run_id.to_string(),
        generated_at: Timestamp::now(),
        entries,
    })
}

/// Recursively visits `dir`, appending one [`ArtifactEntry`] per regular file
/// found under `root`.
fn walk(root: &Path, dir: &Path, entries: &mut Vec<ArtifactEntry>) -> Result<(), CoreError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, entries)?;
        } else if file_type.is_file() {
            let relative = relative_slash_path(root, &path);
            let contents = fs::read(&path)?;
            entries.push(ArtifactEntry {
                path: relative,
                size: contents.len() as u64,
                sha256: hash_bytes(&contents),
            });
        }
    }
    Ok(())
}

/// Renders `path` relative to `root` using `/` separators regardless of platform.
fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative: PathBuf = path
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf());
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::build_manifest;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn entries_are_sorted_by_path_and_sized_correctly() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("reports")).unwrap();
        fs::write(dir.path().join("reports/b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let manifest = build_manifest(dir.path(), "RUN-1").unwrap();
        let paths: Vec<_> = manifest.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "reports/b.txt"]);
        assert_eq!(manifest.entries[0].size, 1);
        assert_eq!(manifest.entries[1].size, 2);
    }

    #[test]
    fn missing_directory_yields_empty_manifest() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let manifest = build_manifest(&missing, "RUN-1").unwrap();
        assert!(manifest.entries.is_empty());
    }
}
