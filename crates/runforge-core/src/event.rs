// crates/runforge-core/src/event.rs
// ============================================================================
// Module: Runforge Events
// Description: The structured event shape appended to `events.jsonl`.
// Purpose: Give every event writer (registry, workflow, exploration, crawl)
//          one shape with the fields every consumer (SSE, audit) expects.
// Dependencies: crate::{ids, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Every event carries `event`, `run_id`, and `timestamp`, plus whatever
//! event-specific fields the emitter supplies. Fields are flattened into the
//! top-level JSON object on serialization, matching the untyped event
//! payloads the original implementation produced, while keeping the three
//! required fields strongly typed.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::ids::RunId;
use crate::time::Timestamp;

/// A structured event appended to a run's `events.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event name, e.g. `"run.created"`, `"auth.completed"`.
    pub event: String,
    /// The run this event belongs to.
    pub run_id: RunId,
    /// When the event was recorded.
    pub timestamp: Timestamp,
    /// Event-specific fields, flattened alongside `event`/`run_id`/`timestamp`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Builds an event with no extra fields.
    #[must_use]
    pub fn new(event: impl Into<String>, run_id: RunId) -> Self {
        Self {
            event: event.into(),
            run_id,
            timestamp: Timestamp::now(),
            fields: Map::new(),
        }
    }

    /// Builds an event from a pre-built field map.
    #[must_use]
    pub fn with_fields(event: impl Into<String>, run_id: RunId, fields: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            run_id,
            timestamp: Timestamp::now(),
            fields,
        }
    }
}
