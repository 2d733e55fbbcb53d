// crates/runforge-core/src/status.rs
// ============================================================================
// Module: Runforge Run Status
// Description: The run status state machine.
// Purpose: Give every layer one closed set of status values instead of
//          passing status strings around.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A run's status moves `Pending -> Running -> (AuthInProgress | AuthSkipped)
//! -> ExplorationInProgress -> CrawlInProgress -> Completed`, with any phase
//! able to transition straight to `Failed`. The state machine itself only
//! enumerates the values and which ones are terminal; ordering is enforced
//! by the workflow engine, which is the only writer of a running workflow's
//! status.

use serde::Deserialize;
use serde::Serialize;

/// A run's lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Recorded at creation, before the executor pool has dequeued the run.
    Pending,
    /// The workflow has started executing.
    Running,
    /// The auth phase is executing.
    AuthInProgress,
    /// The auth phase was skipped (no credentials or no orchestrator).
    AuthSkipped,
    /// The exploration phase is executing.
    ExplorationInProgress,
    /// The crawl phase is executing.
    CrawlInProgress,
    /// The workflow finished all phases successfully.
    Completed,
    /// Any phase raised a terminal error.
    Failed,
}

impl RunStatus {
    /// Returns `true` for the two statuses from which a run never transitions again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::AuthInProgress => "AuthInProgress",
            Self::AuthSkipped => "AuthSkipped",
            Self::ExplorationInProgress => "ExplorationInProgress",
            Self::CrawlInProgress => "CrawlInProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::RunStatus;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::CrawlInProgress.is_terminal());
    }
}
