// crates/runforge-workflow/src/telemetry.rs
// ============================================================================
// Module: Runforge Telemetry Sink
// Description: Per-run structured log plus a rolling metrics summary.
// Purpose: Give the workflow engine and its activities one place to emit
//          `auth.*`/`exploration.*`/`crawl.*`/`guardrail.*`/`workflow.*`
//          events without each activity owning its own file handle.
// Dependencies: runforge-core::{Timestamp, CoreError}, serde_json, tracing
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/observability.py::RunObservability`: every emitted
//! event is appended to `observability/logs.jsonl` and folded into a
//! `observability/metrics.json` summary keyed by the event's category
//! (`auth`, `exploration`, `crawl`, `guardrails`, `workflow`). External
//! forwarding (Langfuse) is out of scope per spec.md §1 and is not
//! implemented here.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use runforge_core::Timestamp;
use serde_json::Map;
use serde_json::Value;

/// A destination for structured workflow telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Emits one event for `run_id`, carrying `payload`'s fields.
    fn emit(&self, run_id: &str, event: &str, payload: Map<String, Value>);

    /// Whether this sink discards every event. [`WorkflowEngine::bind_telemetry`]
    /// uses this to decide whether a previously-bound sink should be replaced.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Discards every event; the default for activities constructed standalone.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _run_id: &str, _event: &str, _payload: Map<String, Value>) {}

    fn is_noop(&self) -> bool {
        true
    }
}

/// Appends events to `<run_dir>/observability/logs.jsonl` and maintains a
/// `metrics.json` summary alongside it.
pub struct RunObservability {
    storage_root: PathBuf,
    metrics: Mutex<HashMap<String, Map<String, Value>>>,
}

impl RunObservability {
    /// Builds an observability sink rooted at `storage_root` (the directory
    /// containing `<slug>/<run_id>/` partitions).
    #[must_use]
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            metrics: Mutex::new(HashMap::new()),
        }
    }

    /// Finds a run's directory by scanning tenant partitions for
    /// `<slug>/<run_id>`. Used because the telemetry sink is constructed
    /// before (and shared across) individual runs, unlike the registry
    /// which resolves through its index.
    fn run_dir(&self, run_id: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.storage_root).ok()?;
        for entry in entries.flatten() {
            if !entry.file_type().ok()?.is_dir() {
                continue;
            }
            let candidate = entry.path().join(run_id);
            if candidate.join("run_manifest.json").exists() {
                return Some(candidate);
            }
        }
        None
    }

    fn logs_path(run_dir: &Path) -> PathBuf {
        run_dir.join("observability").join("logs.jsonl")
    }

    fn metrics_path(run_dir: &Path) -> PathBuf {
        run_dir.join("observability").join("metrics.json")
    }

    /// Folds one event's fields into the running per-run metrics summary,
    /// mirroring `RunObservability._update_metrics`.
    fn update_metrics(metrics: &mut Map<String, Value>, event: &str, payload: &Map<String, Value>) {
        match event {
            "auth.completed" | "auth.skipped" => {
                let stage = payload
                    .get("stage")
                    .cloned()
                    .unwrap_or_else(|| Value::String("skipped".to_string()));
                let success = payload.get("success").and_then(Value::as_bool).unwrap_or(true);
                let mut auth = Map::new();
                auth.insert("stage".to_string(), stage);
                auth.insert("success".to_string(), Value::Bool(success));
                metrics.insert("auth".to_string(), Value::Object(auth));
            }
            "exploration.completed" => {
                let mut exploration = Map::new();
                for key in ["coverage_percent", "visited_count", "skipped_count"] {
                    if let Some(value) = payload.get(key) {
                        exploration.insert(key.to_string(), value.clone());
                    }
                }
                metrics.insert("exploration".to_string(), Value::Object(exploration));
            }
            "crawl.completed" => {
                let visited = payload.get("visited_count").and_then(Value::as_u64).unwrap_or(0);
                let skipped = payload.get("skipped_count").and_then(Value::as_u64).unwrap_or(0);
                let mut crawl = Map::new();
                crawl.insert("visited_count".to_string(), Value::from(visited));
                crawl.insert("skipped_count".to_string(), Value::from(skipped));
                let total = visited + skipped;
                if total > 0 {
                    #[allow(clippy::cast_precision_loss, reason = "run-scale counts fit losslessly in f64")]
                    let ratio = (visited as f64 / total as f64 * 10000.0).round() / 10000.0;
                    if let Some(number) = serde_json::Number::from_f64(ratio) {
                        crawl.insert("health_ratio".to_string(), Value::Number(number));
                    }
                }
                metrics.insert("crawl".to_string(), Value::Object(crawl));
            }
            other if other.starts_with("guardrail.") => {
                let kind = other.trim_start_matches("guardrail.").to_string();
                let phase = payload
                    .get("phase")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let guardrails = metrics
                    .entry("guardrails".to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(guardrails) = guardrails {
                    let phase_counts = guardrails
                        .entry(phase)
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(phase_counts) = phase_counts {
                        let count = phase_counts.get(&kind).and_then(Value::as_u64).unwrap_or(0);
                        phase_counts.insert(kind, Value::from(count + 1));
                    }
                }
            }
            "workflow.completed" => {
                let workflow = metrics
                    .entry("workflow".to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(workflow) = workflow {
                    if let Some(timestamp) = payload.get("timestamp") {
                        workflow.insert("completed_at".to_string(), timestamp.clone());
                    }
                    workflow.insert("status".to_string(), Value::String("Completed".to_string()));
                }
            }
            "workflow.failed" => {
                let workflow = metrics
                    .entry("workflow".to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(workflow) = workflow {
                    workflow.insert("status".to_string(), Value::String("Failed".to_string()));
                    if let Some(phase) = payload.get("phase") {
                        workflow.insert("phase".to_string(), phase.clone());
                    }
                    if let Some(error) = payload.get("error") {
                        workflow.insert("error".to_string(), error.clone());
                    }
                }
            }
            _ => {}
        }
    }
}

impl TelemetrySink for RunObservability {
    fn emit(&self, run_id: &str, event: &str, mut payload: Map<String, Value>) {
        let Some(run_dir) = self.run_dir(run_id) else {
            tracing::debug!(run_id, event, "telemetry event for unknown run; dropping");
            return;
        };

        payload
            .entry("run_id".to_string())
            .or_insert_with(|| Value::String(run_id.to_string()));
        payload.entry("timestamp".to_string()).or_insert_with(|| {
            Timestamp::now()
                .to_rfc3339()
                .map_or(Value::Null, Value::String)
        });
        payload.insert("event".to_string(), Value::String(event.to_string()));

        let logs_path = Self::logs_path(&run_dir);
        if let Some(parent) = logs_path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::error!(run_id, error = %err, "failed to create observability directory");
                return;
            }
        }
        let append_result = serde_json::to_string(&payload).map(|mut line| {
            line.push('\n');
            line
        });
        match append_result {
            Ok(line) => {
                if let Err(err) = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&logs_path)
                    .and_then(|mut file| file.write_all(line.as_bytes()))
                {
                    tracing::error!(run_id, error = %err, "failed to append telemetry log");
                }
            }
            Err(err) => tracing::error!(run_id, error = %err, "failed to serialize telemetry event"),
        }

        let mut metrics_table = self.metrics.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let metrics = metrics_table.entry(run_id.to_string()).or_default();
        Self::update_metrics(metrics, event, &payload);
        let rendered = serde_json::to_string_pretty(metrics).unwrap_or_default();
        if let Err(err) = fs::write(Self::metrics_path(&run_dir), rendered) {
            tracing::error!(run_id, error = %err, "failed to persist telemetry metrics");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunObservability;
    use super::TelemetrySink;
    use std::fs;
    use tempfile::tempdir;

    fn seed_run(storage_root: &std::path::Path, slug: &str, run_id: &str) {
        let run_dir = storage_root.join(slug).join(run_id);
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join("run_manifest.json"), "{}").unwrap();
    }

    #[test]
    fn emit_appends_log_line_and_updates_metrics() {
        let dir = tempdir().unwrap();
        seed_run(dir.path(), "default", "RUN-1");
        let sink = RunObservability::new(dir.path());

        let mut payload = serde_json::Map::new();
        payload.insert("coverage_percent".to_string(), serde_json::json!(0.8));
        payload.insert("visited_count".to_string(), serde_json::json!(4));
        payload.insert("skipped_count".to_string(), serde_json::json!(1));
        sink.emit("RUN-1", "exploration.completed", payload);

        let logs = fs::read_to_string(dir.path().join("default/RUN-1/observability/logs.jsonl")).unwrap();
        assert_eq!(logs.lines().count(), 1);

        let metrics: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("default/RUN-1/observability/metrics.json")).unwrap())
                .unwrap();
        assert_eq!(metrics["exploration"]["visited_count"], 4);
    }

    #[test]
    fn crawl_metrics_compute_health_ratio() {
        let dir = tempdir().unwrap();
        seed_run(dir.path(), "default", "RUN-1");
        let sink = RunObservability::new(dir.path());

        let mut payload = serde_json::Map::new();
        payload.insert("visited_count".to_string(), serde_json::json!(3));
        payload.insert("skipped_count".to_string(), serde_json::json!(1));
        sink.emit("RUN-1", "crawl.completed", payload);

        let metrics: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("default/RUN-1/observability/metrics.json")).unwrap())
                .unwrap();
        assert_eq!(metrics["crawl"]["health_ratio"], 0.75);
    }

    #[test]
    fn guardrail_events_increment_a_phase_counter() {
        let dir = tempdir().unwrap();
        seed_run(dir.path(), "default", "RUN-1");
        let sink = RunObservability::new(dir.path());

        let mut payload = serde_json::Map::new();
        payload.insert("phase".to_string(), serde_json::json!("exploration"));
        sink.emit("RUN-1", "guardrail.blocklist", payload.clone());
        sink.emit("RUN-1", "guardrail.blocklist", payload);

        let metrics: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("default/RUN-1/observability/metrics.json")).unwrap())
                .unwrap();
        assert_eq!(metrics["guardrails"]["exploration"]["blocklist"], 2);
    }

    #[test]
    fn event_for_unknown_run_is_dropped_without_error() {
        let dir = tempdir().unwrap();
        let sink = RunObservability::new(dir.path());
        sink.emit("RUN-DOES-NOT-EXIST", "workflow.started", serde_json::Map::new());
    }
}
