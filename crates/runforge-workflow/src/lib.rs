// crates/runforge-workflow/src/lib.rs
// ============================================================================
// Module: Runforge Workflow Library
// Description: Public API surface for the Runforge workflow engine.
// Purpose: Expose the retry/task-runner primitives, telemetry sink, the
//          exploration/crawl activities, the workflow engine, and the
//          executor pool to the server and CLI crates.
// Dependencies: crate::{crawl, engine, error, exploration, pool, retry, telemetry}
// ============================================================================

//! ## Overview
//! Runforge workflow turns a created run into a finished (or failed) one:
//! [`engine::WorkflowEngine`] drives the auth/exploration/crawl phases
//! through [`retry::TaskRunner`], persisting checkpoints via
//! `runforge_registry::RunRegistry` and events via [`telemetry::TelemetrySink`].
//! [`pool::ExecutorPool`] is the FIFO worker pool that dequeues submitted
//! run ids and calls the engine.

pub mod crawl;
pub mod engine;
pub mod error;
pub mod exploration;
pub mod pool;
pub mod retry;
pub mod telemetry;

pub use crawl::CrawlConfig;
pub use crawl::CrawlResult;
pub use crawl::SkippedPage as CrawlSkippedPage;
pub use crawl::VisitedPage;
pub use engine::AuthOrchestrator;
pub use engine::AuthOutcome;
pub use engine::SiteMapBuilder;
pub use engine::WorkflowEngine;
pub use engine::WorkflowOutcome;
pub use error::ActivityError;
pub use exploration::ExplorationConfig;
pub use exploration::ExplorationResult;
pub use pool::ExecutorPool;
pub use retry::RetryPolicy;
pub use retry::TaskRunner;
pub use telemetry::NoopTelemetry;
pub use telemetry::RunObservability;
pub use telemetry::TelemetrySink;
