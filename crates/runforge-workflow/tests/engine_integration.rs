// crates/runforge-workflow/tests/engine_integration.rs
// ============================================================================
// Module: Runforge Workflow Engine Integration Tests
// Description: Drives `WorkflowEngine::execute` through every phase with a
//              stub `AuthOrchestrator`, asserting the run reaches
//              `Completed` and the bound telemetry sink observes every
//              phase-completion event.
// Dependencies: runforge-workflow, runforge-registry, runforge-core, tempfile
// ============================================================================

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use runforge_core::Adjacency;
use runforge_core::CreateRunPayload;
use runforge_core::PageDescriptor;
use runforge_core::RawCreateRunPayload;
use runforge_core::RunId;
use runforge_core::RunStatus;
use runforge_core::Section;
use runforge_registry::NoopAuditSink;
use runforge_registry::RunRegistry;
use runforge_workflow::AuthOrchestrator;
use runforge_workflow::AuthOutcome;
use runforge_workflow::CrawlConfig;
use runforge_workflow::ExplorationConfig;
use runforge_workflow::RetryPolicy;
use runforge_workflow::TelemetrySink;
use runforge_workflow::WorkflowEngine;
use serde_json::Map;
use serde_json::Value;
use tempfile::tempdir;

struct AlwaysSucceedsAuth;

impl AuthOrchestrator for AlwaysSucceedsAuth {
    fn authenticate(
        &self,
        _run_id: &RunId,
        _credentials: &runforge_core::Credentials,
    ) -> Result<AuthOutcome, runforge_workflow::ActivityError> {
        Ok(AuthOutcome { success: true, stage: "logged_in".to_string(), error: None })
    }
}

struct RecordingTelemetry {
    events: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, _run_id: &str, event: &str, _payload: Map<String, Value>) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(event.to_string());
    }
}

fn home_page() -> PageDescriptor {
    PageDescriptor {
        page_id: "home".to_string(),
        url: "https://example.test/".to_string(),
        title: "Home".to_string(),
        section: Section::new("public"),
        screenshot_path: None,
        dom_snapshot_path: None,
    }
}

#[test]
fn execute_runs_every_phase_and_reaches_completed() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(RunRegistry::open(dir.path().to_path_buf(), Arc::new(NoopAuditSink)).unwrap());

    let telemetry = Arc::new(RecordingTelemetry { events: Mutex::new(Vec::new()), count: AtomicUsize::new(0) });
    let mut engine = WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::new(runforge_workflow::NoopTelemetry),
        RetryPolicy::default(),
        ExplorationConfig::default(),
        CrawlConfig::default(),
    );
    engine.bind_telemetry(Arc::clone(&telemetry) as Arc<dyn TelemetrySink>);
    let engine = engine.with_auth_orchestrator(Arc::new(AlwaysSucceedsAuth));

    let payload = CreateRunPayload::from_raw(RawCreateRunPayload {
        target_url: Some("https://example.test".to_string()),
        credentials: Some(serde_json::json!({"secret_ref": "vault://example"})),
        ..Default::default()
    })
    .unwrap();
    let run = registry.create_run(payload).unwrap();

    let page = home_page();
    let outcome = engine.execute(&run.id, Some((vec![page], Adjacency::new()))).unwrap();
    assert_eq!(outcome.auth_stage, "logged_in");

    let reloaded = registry.get_run(&run.id).unwrap();
    assert_eq!(reloaded.status, RunStatus::Completed);

    let seen = telemetry.events.lock().unwrap();
    assert!(seen.contains(&"auth.completed".to_string()));
    assert!(seen.contains(&"exploration.completed".to_string()));
    assert!(seen.contains(&"crawl.completed".to_string()));
    assert!(seen.contains(&"workflow.completed".to_string()));
}

#[test]
fn execute_without_a_site_map_or_builder_fails_without_panicking() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(RunRegistry::open(dir.path().to_path_buf(), Arc::new(NoopAuditSink)).unwrap());
    let engine = WorkflowEngine::new(
        Arc::clone(&registry),
        Arc::new(runforge_workflow::NoopTelemetry),
        RetryPolicy::default(),
        ExplorationConfig::default(),
        CrawlConfig::default(),
    );

    let payload = CreateRunPayload::from_raw(RawCreateRunPayload {
        target_url: Some("https://example.test".to_string()),
        ..Default::default()
    })
    .unwrap();
    let run = registry.create_run(payload).unwrap();

    let result = engine.execute(&run.id, None);
    assert!(result.is_err());
    let reloaded = registry.get_run(&run.id).unwrap();
    assert_eq!(reloaded.status, RunStatus::Failed);
}
