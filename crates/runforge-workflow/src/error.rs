// crates/runforge-workflow/src/error.rs
// ============================================================================
// Module: Runforge Workflow Errors
// Description: The Retryable/Terminal distinction the Task Runner acts on.
// Purpose: Give every activity (auth, exploration, crawl) one error type the
//          runner can branch on without downcasting.
// Dependencies: thiserror, runforge-core::CoreError
// ============================================================================

//! ## Overview
//! Mirrors `gazeqa/workflow.py`'s `WorkflowError`/`RetryableWorkflowError`
//! split, but as a closed enum rather than an exception hierarchy: the Task
//! Runner matches on [`ActivityError::Retryable`] to decide whether to
//! retry, treating every other variant as terminal (spec.md §4.5).

use runforge_core::CoreError;

/// The result of a single activity attempt.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// A transient failure; the Task Runner may retry per the active policy.
    #[error("retryable: {0}")]
    Retryable(String),

    /// A non-retryable failure; propagated after one `<activity>.failed` checkpoint.
    #[error("terminal: {0}")]
    Terminal(String),

    /// A configuration error discovered before any attempt was made (missing
    /// site map builder, empty page list, etc). Always terminal.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ActivityError {
    /// Returns the human-readable message, regardless of variant.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Retryable(message) | Self::Terminal(message) | Self::InvalidInput(message) => {
                message.clone()
            }
        }
    }

    /// Returns the exception-style name used in checkpoint/event metadata,
    /// mirroring `exc.__class__.__name__` in the original implementation.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Retryable(_) => "RetryableWorkflowError",
            Self::Terminal(_) => "WorkflowError",
            Self::InvalidInput(_) => "InvalidInput",
        }
    }
}

impl From<CoreError> for ActivityError {
    fn from(err: CoreError) -> Self {
        Self::Terminal(err.to_string())
    }
}
