// crates/runforge-workflow/src/engine.rs
// ============================================================================
// Module: Runforge Workflow Engine
// Description: Orchestrates the auth/exploration/crawl phases for one run.
// Purpose: Drive a run from `Pending` to `Completed`/`Failed`, recording the
//          status transitions, checkpoints, and telemetry events each phase
//          requires.
// Dependencies: runforge-core, runforge-registry, crate::{retry, exploration,
//               crawl, telemetry, error}
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/workflow.py::RunWorkflow.execute`: a single phase
//! variable tracks where the run currently is so a failure at any point can
//! be attributed correctly in the `workflow.failed` checkpoint, status
//! update, and event. Auth is skipped (not retried) when credentials are
//! empty or no [`AuthOrchestrator`] is configured; exploration and crawl
//! always run through the [`crate::retry::TaskRunner`].

use std::sync::Arc;

use runforge_core::Credentials;
use runforge_core::PageDescriptor;
use runforge_core::Run;
use runforge_core::RunId;
use runforge_core::RunStatus;
use runforge_registry::RunRegistry;
use serde_json::Map;
use serde_json::Value;

use crate::crawl;
use crate::crawl::CrawlConfig;
use crate::crawl::CrawlResult;
use crate::error::ActivityError;
use crate::exploration;
use crate::exploration::ExplorationConfig;
use crate::exploration::ExplorationResult;
use crate::retry::RetryPolicy;
use crate::retry::TaskRunner;
use crate::telemetry::TelemetrySink;

/// Outcome of a successful authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub success: bool,
    pub stage: String,
    pub error: Option<String>,
}

/// Performs the auth phase's single external call.
pub trait AuthOrchestrator: Send + Sync {
    /// Authenticates against the target using `credentials`.
    ///
    /// # Errors
    /// Returns [`ActivityError::Retryable`] for transient failures (network,
    /// timeout) and [`ActivityError::Terminal`] for anything else.
    fn authenticate(&self, run_id: &RunId, credentials: &Credentials) -> Result<AuthOutcome, ActivityError>;
}

/// Produces the page list and adjacency graph a run explores/crawls.
pub trait SiteMapBuilder: Send + Sync {
    /// Builds the site map for `run`.
    ///
    /// # Errors
    /// Returns [`ActivityError::Terminal`] if the site map cannot be built.
    fn build(&self, run: &Run) -> Result<(Vec<PageDescriptor>, runforge_core::Adjacency), ActivityError>;
}

/// The final summary returned once a run completes all phases.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub auth_stage: String,
    pub coverage_percent: f64,
    pub crawl_visited: usize,
    pub crawl_skipped: usize,
}

/// Orchestrates the full lifecycle of a single run.
pub struct WorkflowEngine {
    registry: Arc<RunRegistry>,
    auth_orchestrator: Option<Arc<dyn AuthOrchestrator>>,
    site_map_builder: Option<Arc<dyn SiteMapBuilder>>,
    telemetry: Arc<dyn TelemetrySink>,
    retry_policy: RetryPolicy,
    exploration_config: ExplorationConfig,
    crawl_config: CrawlConfig,
}

impl WorkflowEngine {
    /// Builds an engine bound to `registry`.
    #[must_use]
    pub fn new(
        registry: Arc<RunRegistry>,
        telemetry: Arc<dyn TelemetrySink>,
        retry_policy: RetryPolicy,
        exploration_config: ExplorationConfig,
        crawl_config: CrawlConfig,
    ) -> Self {
        Self {
            registry,
            auth_orchestrator: None,
            site_map_builder: None,
            telemetry,
            retry_policy,
            exploration_config,
            crawl_config,
        }
    }

    /// Installs an auth orchestrator; without one, auth is always skipped.
    #[must_use]
    pub fn with_auth_orchestrator(mut self, orchestrator: Arc<dyn AuthOrchestrator>) -> Self {
        self.auth_orchestrator = Some(orchestrator);
        self
    }

    /// Installs a site map builder, used when [`WorkflowEngine::execute`] is
    /// not given an explicit page list/adjacency.
    #[must_use]
    pub fn with_site_map_builder(mut self, builder: Arc<dyn SiteMapBuilder>) -> Self {
        self.site_map_builder = Some(builder);
        self
    }

    /// Rebinds `telemetry` onto this engine unless a non-noop sink is
    /// already bound. Grounded on `gazeqa/workflow.py`'s
    /// `_bind_component_telemetry`, which installs `RunWorkflow`'s own
    /// telemetry sink onto its exploration engine and crawler only when
    /// their current sink is absent or a no-op; here the engine owns a
    /// single telemetry field rather than one per phase, so there is only
    /// one slot to rebind.
    pub fn bind_telemetry(&mut self, telemetry: Arc<dyn TelemetrySink>) {
        if self.telemetry.is_noop() {
            self.telemetry = telemetry;
        }
    }

    /// Runs every phase for `run_id`, resolving the site map from
    /// `site_map` if given or via the configured [`SiteMapBuilder`]
    /// otherwise.
    ///
    /// # Errors
    /// Returns the first [`ActivityError`] any phase raised, after recording
    /// the run as `Failed` and emitting `workflow.failed`.
    pub fn execute(
        &self,
        run_id: &RunId,
        site_map: Option<(Vec<PageDescriptor>, runforge_core::Adjacency)>,
    ) -> Result<WorkflowOutcome, ActivityError> {
        let run = self.registry.get_run(run_id).map_err(ActivityError::from)?;
        let (pages, adjacency) = self.resolve_site_map(site_map, &run)?;

        let mut phase = "initializing";
        match self.run_phases(run_id, &run, &pages, &adjacency, &mut phase) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                let mut payload = Map::new();
                payload.insert("phase".to_string(), Value::String(phase.to_string()));
                payload.insert("error".to_string(), Value::String(error.message()));
                payload.insert("exception".to_string(), Value::String(error.kind().to_string()));
                self.checkpoint(run_id, "workflow.failed", payload.clone());
                let _ = self.registry.update_status(run_id, RunStatus::Failed, Some(payload.clone()));
                self.telemetry.emit(run_id.as_str(), "workflow.failed", payload);
                Err(error)
            }
        }
    }

    fn run_phases(
        &self,
        run_id: &RunId,
        run: &Run,
        pages: &[PageDescriptor],
        adjacency: &runforge_core::Adjacency,
        phase: &mut &'static str,
    ) -> Result<WorkflowOutcome, ActivityError> {
        let runner = TaskRunner::new(&self.registry, self.retry_policy.clone());

        *phase = "auth";
        let auth_stage = self.run_auth(run_id, run, &runner, *phase)?;

        *phase = "exploration";
        let mut exploration_metadata = Map::new();
        exploration_metadata.insert("phase".to_string(), Value::String((*phase).to_string()));
        exploration_metadata.insert("auth_stage".to_string(), Value::String(auth_stage.clone()));
        self.registry
            .update_status(run_id, RunStatus::ExplorationInProgress, Some(exploration_metadata))
            .map_err(ActivityError::from)?;

        let run_dir = self.registry.run_directory(run_id).map_err(ActivityError::from)?;
        let exploration_config = self.exploration_config.clone();
        let telemetry = Arc::clone(&self.telemetry);
        let pages_owned = pages.to_vec();
        let exploration_result: ExplorationResult = runner.run_activity(
            run_id,
            "exploration",
            None,
            Some(attempt_metadata(*phase)),
            |_attempt| exploration::explore(&run_dir, run_id.as_str(), &exploration_config, &pages_owned, &telemetry),
            |result| {
                let mut metadata = Map::new();
                metadata.insert("coverage_percent".to_string(), Value::from(result.coverage_percent));
                metadata.insert("visited_count".to_string(), Value::from(result.visited_pages.len()));
                metadata
            },
        )?;
        self.emit(
            run_id,
            "exploration.completed",
            [
                ("coverage_percent", Value::from(exploration_result.coverage_percent)),
                ("visited_count", Value::from(exploration_result.visited_pages.len())),
                ("skipped_count", Value::from(exploration_result.skipped_pages.len())),
            ],
        );

        *phase = "crawl";
        let seeds = exploration_result.visited_pages.clone();
        let mut crawl_metadata = Map::new();
        crawl_metadata.insert("phase".to_string(), Value::String((*phase).to_string()));
        crawl_metadata.insert("seed_count".to_string(), Value::from(seeds.len()));
        crawl_metadata.insert("coverage_percent".to_string(), Value::from(exploration_result.coverage_percent));
        self.registry
            .update_status(run_id, RunStatus::CrawlInProgress, Some(crawl_metadata))
            .map_err(ActivityError::from)?;

        let crawl_config = self.crawl_config.clone();
        let telemetry = Arc::clone(&self.telemetry);
        let adjacency_owned = adjacency.clone();
        let crawl_result: CrawlResult = runner.run_activity(
            run_id,
            "crawl",
            None,
            Some(attempt_metadata(*phase)),
            |_attempt| crawl::crawl(&run_dir, run_id.as_str(), &crawl_config, &seeds, &adjacency_owned, &telemetry),
            |result| {
                let mut metadata = Map::new();
                metadata.insert("visited_count".to_string(), Value::from(result.visited.len()));
                metadata.insert("skipped_count".to_string(), Value::from(result.skipped.len()));
                metadata
            },
        )?;
        self.emit(
            run_id,
            "crawl.completed",
            [
                ("visited_count", Value::from(crawl_result.visited.len())),
                ("skipped_count", Value::from(crawl_result.skipped.len())),
            ],
        );

        *phase = "completed";
        let mut completed_metadata = Map::new();
        completed_metadata.insert("phase".to_string(), Value::String((*phase).to_string()));
        completed_metadata.insert("visited".to_string(), Value::from(crawl_result.visited.len()));
        completed_metadata.insert("skipped".to_string(), Value::from(crawl_result.skipped.len()));
        self.registry
            .update_status(run_id, RunStatus::Completed, Some(completed_metadata))
            .map_err(ActivityError::from)?;

        let mut completed_checkpoint = Map::new();
        completed_checkpoint.insert("visited".to_string(), Value::from(crawl_result.visited.len()));
        completed_checkpoint.insert("skipped".to_string(), Value::from(crawl_result.skipped.len()));
        completed_checkpoint.insert("coverage_percent".to_string(), Value::from(exploration_result.coverage_percent));
        self.checkpoint(run_id, "workflow.completed", completed_checkpoint);
        self.emit(
            run_id,
            "workflow.completed",
            [
                ("coverage_percent", Value::from(exploration_result.coverage_percent)),
                ("crawl_visited", Value::from(crawl_result.visited.len())),
                ("crawl_skipped", Value::from(crawl_result.skipped.len())),
            ],
        );

        Ok(WorkflowOutcome {
            auth_stage,
            coverage_percent: exploration_result.coverage_percent,
            crawl_visited: crawl_result.visited.len(),
            crawl_skipped: crawl_result.skipped.len(),
        })
    }

    fn run_auth(
        &self,
        run_id: &RunId,
        run: &Run,
        runner: &TaskRunner<'_>,
        phase: &str,
    ) -> Result<String, ActivityError> {
        let Some(orchestrator) = self.auth_orchestrator.as_ref().filter(|_| !run.credentials.is_empty()) else {
            let reason = if run.credentials.is_empty() { "no_credentials" } else { "orchestrator_unavailable" };
            let mut metadata = Map::new();
            metadata.insert("phase".to_string(), Value::String(phase.to_string()));
            metadata.insert("reason".to_string(), Value::String(reason.to_string()));
            self.registry
                .update_status(run_id, RunStatus::AuthSkipped, Some(metadata))
                .map_err(ActivityError::from)?;
            let mut checkpoint_fields = Map::new();
            checkpoint_fields.insert("reason".to_string(), Value::String(reason.to_string()));
            self.checkpoint(run_id, "auth.skipped", checkpoint_fields);
            self.emit(run_id, "auth.skipped", [("reason", Value::String(reason.to_string()))]);
            return Ok("skipped".to_string());
        };

        let mut status_metadata = Map::new();
        status_metadata.insert("phase".to_string(), Value::String(phase.to_string()));
        self.registry
            .update_status(run_id, RunStatus::AuthInProgress, Some(status_metadata))
            .map_err(ActivityError::from)?;

        let credentials = run.credentials.clone();
        let outcome: AuthOutcome = runner.run_activity(
            run_id,
            "auth",
            None,
            Some(attempt_metadata(phase)),
            |_attempt| {
                let result = orchestrator.authenticate(run_id, &credentials)?;
                if !result.success {
                    return Err(ActivityError::Terminal(
                        result.error.clone().unwrap_or_else(|| "authentication failed".to_string()),
                    ));
                }
                Ok(result)
            },
            |result| {
                let mut metadata = Map::new();
                metadata.insert("stage".to_string(), Value::String(result.stage.clone()));
                metadata.insert("success".to_string(), Value::Bool(result.success));
                metadata
            },
        )?;
        self.emit(
            run_id,
            "auth.completed",
            [("stage", Value::String(outcome.stage.clone())), ("success", Value::Bool(outcome.success))],
        );
        Ok(outcome.stage)
    }

    fn resolve_site_map(
        &self,
        site_map: Option<(Vec<PageDescriptor>, runforge_core::Adjacency)>,
        run: &Run,
    ) -> Result<(Vec<PageDescriptor>, runforge_core::Adjacency), ActivityError> {
        if let Some(resolved) = site_map {
            return Ok(resolved);
        }
        let builder = self
            .site_map_builder
            .as_ref()
            .ok_or_else(|| ActivityError::Terminal("site map builder not configured and site map not provided".to_string()))?;
        builder.build(run)
    }

    fn checkpoint(&self, run_id: &RunId, name: &str, details: Map<String, Value>) {
        if let Err(err) = self.registry.record_checkpoint(run_id, name, Some(details)) {
            tracing::error!(run_id = %run_id, checkpoint = name, error = %err, "failed to record checkpoint");
        }
    }

    fn emit<const N: usize>(&self, run_id: &RunId, event: &str, fields: [(&str, Value); N]) {
        let mut payload = Map::new();
        for (key, value) in fields {
            payload.insert(key.to_string(), value);
        }
        self.telemetry.emit(run_id.as_str(), event, payload);
    }
}

fn attempt_metadata(phase: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("phase".to_string(), Value::String(phase.to_string()));
    metadata
}

#[cfg(test)]
mod tests {
    use super::WorkflowEngine;
    use crate::crawl::CrawlConfig;
    use crate::exploration::ExplorationConfig;
    use crate::retry::RetryPolicy;
    use crate::telemetry::NoopTelemetry;
    use crate::telemetry::TelemetrySink;
    use runforge_registry::NoopAuditSink;
    use runforge_registry::RunRegistry;
    use serde_json::Map;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct CountingTelemetry {
        count: std::sync::atomic::AtomicUsize,
    }

    impl TelemetrySink for CountingTelemetry {
        fn emit(&self, _run_id: &str, _event: &str, _payload: Map<String, serde_json::Value>) {
            self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn engine() -> WorkflowEngine {
        let dir = tempdir().unwrap();
        let registry = Arc::new(RunRegistry::open(dir.path(), Arc::new(NoopAuditSink)).unwrap());
        WorkflowEngine::new(
            registry,
            Arc::new(NoopTelemetry),
            RetryPolicy::default(),
            ExplorationConfig::default(),
            CrawlConfig::default(),
        )
    }

    #[test]
    fn bind_telemetry_replaces_a_noop_sink() {
        let mut engine = engine();
        let telemetry = Arc::new(CountingTelemetry { count: std::sync::atomic::AtomicUsize::new(0) });
        engine.bind_telemetry(Arc::clone(&telemetry) as Arc<dyn TelemetrySink>);
        engine.telemetry.emit("RUN-1", "workflow.started", Map::new());
        assert_eq!(telemetry.count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_telemetry_leaves_an_already_bound_sink_in_place() {
        let mut engine = engine();
        let first = Arc::new(CountingTelemetry { count: std::sync::atomic::AtomicUsize::new(0) });
        engine.bind_telemetry(Arc::clone(&first) as Arc<dyn TelemetrySink>);

        let second = Arc::new(CountingTelemetry { count: std::sync::atomic::AtomicUsize::new(0) });
        engine.bind_telemetry(Arc::clone(&second) as Arc<dyn TelemetrySink>);

        engine.telemetry.emit("RUN-1", "workflow.started", Map::new());
        assert_eq!(first.count.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(second.count.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
