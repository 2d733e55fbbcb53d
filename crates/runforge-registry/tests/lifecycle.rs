// crates/runforge-registry/tests/lifecycle.rs
// ============================================================================
// Module: Runforge Registry Integration Tests
// Description: Exercises `RunRegistry` end to end through its public API:
//              create, mutate, checkpoint, audit, and rebuild the index
//              from the files it wrote.
// Dependencies: runforge-registry, runforge-core, tempfile
// ============================================================================

use std::sync::Arc;

use runforge_core::CreateRunPayload;
use runforge_core::RawCreateRunPayload;
use runforge_core::RunStatus;
use runforge_registry::artifacts::build_manifest;
use runforge_registry::index::rebuild_index;
use runforge_registry::FileAuditSink;
use runforge_registry::RunRegistry;
use tempfile::tempdir;

fn payload(url: &str) -> CreateRunPayload {
    CreateRunPayload::from_raw(RawCreateRunPayload {
        target_url: Some(url.to_string()),
        organization_slug: Some("acme".to_string()),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn full_run_lifecycle_is_visible_through_the_public_api() {
    let dir = tempdir().unwrap();
    let audit = Arc::new(FileAuditSink::new(dir.path()).unwrap());
    let registry = RunRegistry::open(dir.path().to_path_buf(), audit).unwrap();

    let run = registry.create_run(payload("https://example.test")).unwrap();
    registry.update_status(&run.id, RunStatus::AuthInProgress, None).unwrap();
    registry.update_status(&run.id, RunStatus::ExplorationInProgress, None).unwrap();
    registry.record_checkpoint(&run.id, "exploration.checkpoint", None).unwrap();
    registry.update_status(&run.id, RunStatus::Completed, None).unwrap();

    let reloaded = registry.get_run(&run.id).unwrap();
    assert_eq!(reloaded.status, RunStatus::Completed);
    assert!(reloaded.status_history.len() >= 4);

    let events = registry.get_run_events(&run.id).unwrap();
    assert!(events.iter().any(|event| event.event == "run.created"));

    let metadata = registry.get_run_metadata(&run.id).unwrap();
    assert_eq!(metadata.organization_slug, "acme");

    let audit_log = dir.path().join("_audit/audit.log.jsonl");
    assert!(audit_log.exists(), "audit log should have been created");
}

#[test]
fn rebuilding_the_index_recovers_a_run_created_by_a_prior_registry_instance() {
    let dir = tempdir().unwrap();
    let run_id = {
        let audit = Arc::new(runforge_registry::NoopAuditSink);
        let registry = RunRegistry::open(dir.path().to_path_buf(), audit).unwrap();
        registry.create_run(payload("https://example.test")).unwrap().id
    };

    // Drop the index file to simulate a run directory whose index is stale
    // or missing, then rebuild from the on-disk manifests alone.
    std::fs::remove_file(dir.path().join("run_index.json")).ok();
    let index = rebuild_index(dir.path(), false).unwrap();
    assert!(index.contains_key(run_id.as_str()));

    let audit = Arc::new(runforge_registry::NoopAuditSink);
    let registry = RunRegistry::open(dir.path().to_path_buf(), audit).unwrap();
    assert!(registry.get_run(&run_id).is_ok());
}

#[test]
fn artifact_manifest_reflects_files_written_into_the_run_directory() {
    let dir = tempdir().unwrap();
    let audit = Arc::new(runforge_registry::NoopAuditSink);
    let registry = RunRegistry::open(dir.path().to_path_buf(), audit).unwrap();
    let run = registry.create_run(payload("https://example.test")).unwrap();

    let run_dir = registry.run_directory(&run.id).unwrap();
    std::fs::create_dir_all(run_dir.join("reports")).unwrap();
    std::fs::write(run_dir.join("reports/summary.json"), b"{\"ok\":true}").unwrap();

    let manifest = build_manifest(&run_dir, run.id.as_str()).unwrap();
    assert!(manifest.entries.iter().any(|entry| entry.path == "reports/summary.json"));
}
