// crates/runforge-workflow/src/retry.rs
// ============================================================================
// Module: Runforge Retry Policy & Task Runner
// Description: Per-activity retry/checkpoint semantics (spec.md §4.5).
// Purpose: Give every workflow phase the same attempt/retry/failed/succeeded
//          checkpoint sequence without duplicating the loop per activity.
// Dependencies: runforge-registry::RunRegistry, crate::error::ActivityError
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/workflow.py`'s `RetryPolicy`/`TemporalTaskRunner`:
//! a retry loop modeled as an explicit `(attempt, last_error)` state machine
//! (spec.md §9) rather than exception-driven control flow. Only
//! [`ActivityError::Retryable`] triggers a retry; every other variant is
//! terminal after one `<name>.failed` checkpoint.

use std::thread;
use std::time::Duration;
use std::time::Instant;

use runforge_core::RunId;
use runforge_registry::RunRegistry;
use serde_json::Map;
use serde_json::Value;

use crate::error::ActivityError;

/// Retry behaviour for one kind of workflow activity.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, always ≥ 1.
    pub max_attempts: u32,
    /// Backoff seconds indexed by (zero-based) attempt number; the last
    /// entry is reused once `attempt` runs past the list's length.
    pub backoff_seconds: Vec<f64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_seconds: vec![0.0, 0.0, 0.0],
        }
    }
}

impl RetryPolicy {
    /// Returns the sleep duration after attempt `attempt` (1-indexed) fails,
    /// before attempt `attempt + 1` starts. Returns zero when
    /// `backoff_seconds` is empty.
    #[must_use]
    pub fn sleep_for(&self, attempt: u32) -> Duration {
        let Some(last_index) = self.backoff_seconds.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = (attempt as usize).min(last_index);
        Duration::from_secs_f64(self.backoff_seconds[index].max(0.0))
    }
}

/// Drives a single activity through its retry policy, recording checkpoints.
pub struct TaskRunner<'a> {
    /// Registry used to persist checkpoints.
    registry: &'a RunRegistry,
    /// Policy used when an activity call site doesn't supply its own.
    default_policy: RetryPolicy,
}

impl<'a> TaskRunner<'a> {
    /// Builds a runner bound to `registry`, with `default_policy` used when
    /// [`TaskRunner::run_activity`] is called without an override.
    #[must_use]
    pub fn new(registry: &'a RunRegistry, default_policy: RetryPolicy) -> Self {
        Self {
            registry,
            default_policy,
        }
    }

    /// Runs `activity` under `policy` (or the default), recording
    /// `<name>.attempt`/`.retry`/`.failed`/`.succeeded` checkpoints.
    ///
    /// `activity` receives the 1-indexed attempt number. `success_metadata`
    /// derives checkpoint metadata from a successful result; failures to
    /// compute it are swallowed (best-effort, matching the original's
    /// defensive logging around `success_metadata_fn`).
    ///
    /// # Errors
    /// Returns the last [`ActivityError`] once retries (if any) are
    /// exhausted, or immediately for a [`ActivityError::Terminal`]/
    /// [`ActivityError::InvalidInput`] result.
    pub fn run_activity<T>(
        &self,
        run_id: &RunId,
        name: &str,
        policy: Option<&RetryPolicy>,
        attempt_metadata: Option<Map<String, Value>>,
        mut activity: impl FnMut(u32) -> Result<T, ActivityError>,
        success_metadata: impl Fn(&T) -> Map<String, Value>,
    ) -> Result<T, ActivityError> {
        let policy = policy.unwrap_or(&self.default_policy);
        let mut last_error: Option<ActivityError> = None;

        for attempt in 1..=policy.max_attempts {
            let mut attempt_payload = attempt_metadata.clone().unwrap_or_default();
            attempt_payload.insert("attempt".to_string(), Value::from(attempt));
            self.checkpoint(run_id, &format!("{name}.attempt"), attempt_payload);

            let start = Instant::now();
            match activity(attempt) {
                Ok(result) => {
                    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                    let mut success_payload = Map::new();
                    success_payload.insert("attempt".to_string(), Value::from(attempt));
                    success_payload.insert("duration_ms".to_string(), json_round(duration_ms));
                    for (key, value) in success_metadata(&result) {
                        success_payload.insert(key, value);
                    }
                    self.checkpoint(run_id, &format!("{name}.succeeded"), success_payload);
                    return Ok(result);
                }
                Err(ActivityError::Retryable(message)) => {
                    let mut retry_payload = Map::new();
                    retry_payload.insert("attempt".to_string(), Value::from(attempt));
                    retry_payload.insert("error".to_string(), Value::String(message.clone()));
                    retry_payload.insert(
                        "exception".to_string(),
                        Value::String("RetryableWorkflowError".to_string()),
                    );
                    self.checkpoint(run_id, &format!("{name}.retry"), retry_payload.clone());

                    if attempt >= policy.max_attempts {
                        self.checkpoint(run_id, &format!("{name}.failed"), retry_payload);
                        return Err(ActivityError::Retryable(message));
                    }
                    last_error = Some(ActivityError::Retryable(message));
                    let sleep_for = policy.sleep_for(attempt);
                    if sleep_for > Duration::ZERO {
                        thread::sleep(sleep_for);
                    }
                }
                Err(other) => {
                    let mut failure_payload = Map::new();
                    failure_payload.insert("attempt".to_string(), Value::from(attempt));
                    failure_payload.insert("error".to_string(), Value::String(other.message()));
                    failure_payload.insert("exception".to_string(), Value::String(other.kind().to_string()));
                    self.checkpoint(run_id, &format!("{name}.failed"), failure_payload);
                    return Err(other);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ActivityError::Terminal(format!("activity {name} did not complete but no error captured"))
        }))
    }

    /// Records a checkpoint, logging (but not propagating) a write failure —
    /// a checkpoint write is never allowed to mask the activity's own result.
    fn checkpoint(&self, run_id: &RunId, name: &str, details: Map<String, Value>) {
        if let Err(err) = self.registry.record_checkpoint(run_id, name, Some(details)) {
            tracing::error!(run_id = %run_id, checkpoint = %name, error = %err, "failed to record checkpoint");
        }
    }
}

/// Rounds a millisecond duration to 2 decimal places, matching
/// `round((time.monotonic() - start_time) * 1000, 2)`.
fn json_round(value: f64) -> Value {
    let rounded = (value * 100.0).round() / 100.0;
    serde_json::Number::from_f64(rounded).map_or(Value::Null, Value::Number)
}
