// crates/runforge-workflow/src/exploration.rs
// ============================================================================
// Module: Runforge Exploration Activity
// Description: Deterministic coverage-threshold page selection with guardrails.
// Purpose: Implement the exploration phase's algorithm and artifact writes,
//          independent of the workflow engine that invokes it.
// Dependencies: runforge-core::{PageDescriptor, hashing::n/a}, crate::telemetry
// ============================================================================

//! ## Overview
//! Implements spec.md §4.3 exactly: a coverage budget over the first `N`
//! pages (input order preserved), with a blocklist guardrail checked before
//! a rate-limit guardrail, persisted to `exploration/coverage_report.json`,
//! `visited_pages.jsonl`, `skipped_pages.jsonl`, and (if any guardrail
//! fired) `guardrails.jsonl`. Grounded on `gazeqa/exploration.py`, with the
//! blocklist/rate-limit guardrail split added from spec.md (the original
//! scaffold had no guardrails at all).

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use runforge_core::PageDescriptor;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ActivityError;
use crate::telemetry::TelemetrySink;

/// Configuration for one exploration run.
#[derive(Debug, Clone)]
pub struct ExplorationConfig {
    /// Fraction of pages (in `(0, 1]`) the budget admits.
    pub coverage_threshold: f64,
    /// Visited-count cap; `0` means unlimited.
    pub max_pages_per_run: u32,
    /// Keywords that force a page into the blocklist guardrail.
    pub destructive_keywords: Vec<String>,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.8,
            max_pages_per_run: 0,
            destructive_keywords: Vec::new(),
        }
    }
}

/// Outcome of one exploration run.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorationResult {
    /// Fraction of input pages that were visited, rounded to 4 decimals.
    pub coverage_percent: f64,
    /// Pages admitted by the budget and not caught by a guardrail.
    pub visited_pages: Vec<PageDescriptor>,
    /// Pages excluded, whether by the budget or a guardrail.
    pub skipped_pages: Vec<PageDescriptor>,
}

/// Runs the exploration algorithm over `pages`, persisting artifacts under
/// `run_dir/exploration/` and emitting guardrail/telemetry events through
/// `telemetry`.
///
/// # Errors
/// Returns [`ActivityError::InvalidInput`] if `pages` is empty, or
/// [`ActivityError::Terminal`] on an I/O failure while persisting artifacts.
pub fn explore(
    run_dir: &Path,
    run_id: &str,
    config: &ExplorationConfig,
    pages: &[PageDescriptor],
    telemetry: &Arc<dyn TelemetrySink>,
) -> Result<ExplorationResult, ActivityError> {
    if pages.is_empty() {
        return Err(ActivityError::InvalidInput("site_map must contain at least one page".to_string()));
    }

    #[allow(clippy::cast_precision_loss, reason = "page counts are small enough to round-trip through f64")]
    let budget = 1.max((pages.len() as f64 * config.coverage_threshold).floor() as usize);
    let candidates = &pages[..budget.min(pages.len())];
    let baseline_skipped = &pages[budget.min(pages.len())..];

    let mut visited = Vec::new();
    let mut skipped = Vec::new();
    let mut guardrails = Vec::new();

    let mut index = 0;
    while index < candidates.len() {
        let page = &candidates[index];
        if page.matches_any_keyword(&config.destructive_keywords) {
            guardrails.push(guardrail_event("blocklist", "exploration", page));
            skipped.push(page.clone());
        } else if config.max_pages_per_run > 0 && visited.len() as u32 >= config.max_pages_per_run {
            guardrails.push(guardrail_event("rate_limit", "exploration", page));
            skipped.extend(candidates[index..].iter().cloned());
            break;
        } else {
            visited.push(page.clone());
        }
        index += 1;
    }
    skipped.extend(baseline_skipped.iter().cloned());

    #[allow(clippy::cast_precision_loss, reason = "page counts are small enough to round-trip through f64")]
    let coverage_percent = (visited.len() as f64 / pages.len() as f64 * 10_000.0).round() / 10_000.0;

    let exploration_dir = run_dir.join("exploration");
    fs::create_dir_all(&exploration_dir).map_err(|err| ActivityError::Terminal(err.to_string()))?;
    persist(&exploration_dir, run_id, coverage_percent, &visited, &skipped, &guardrails)
        .map_err(|err| ActivityError::Terminal(err.to_string()))?;

    for event in &guardrails {
        telemetry.emit(run_id, &format!("guardrail.{}", event.kind), event.fields.clone());
    }

    Ok(ExplorationResult {
        coverage_percent,
        visited_pages: visited,
        skipped_pages: skipped,
    })
}

/// One guardrail intervention recorded during exploration or crawl.
struct GuardrailEvent {
    kind: &'static str,
    fields: Map<String, Value>,
}

fn guardrail_event(kind: &'static str, phase: &str, page: &PageDescriptor) -> GuardrailEvent {
    let mut fields = Map::new();
    fields.insert("phase".to_string(), Value::String(phase.to_string()));
    fields.insert("url".to_string(), Value::String(page.url.clone()));
    fields.insert("page_id".to_string(), Value::String(page.page_id.clone()));
    GuardrailEvent { kind, fields }
}

fn persist(
    dir: &Path,
    run_id: &str,
    coverage_percent: f64,
    visited: &[PageDescriptor],
    skipped: &[PageDescriptor],
    guardrails: &[GuardrailEvent],
) -> std::io::Result<()> {
    let coverage_report = serde_json::json!({
        "run_id": run_id,
        "coverage_percent": coverage_percent,
        "visited_count": visited.len(),
        "total_pages": visited.len() + skipped.len(),
    });
    fs::write(
        dir.join("coverage_report.json"),
        serde_json::to_string_pretty(&coverage_report).unwrap_or_default(),
    )?;

    write_jsonl(&dir.join("visited_pages.jsonl"), visited)?;
    write_jsonl(&dir.join("skipped_pages.jsonl"), skipped)?;

    if !guardrails.is_empty() {
        let mut file = fs::File::create(dir.join("guardrails.jsonl"))?;
        for event in guardrails {
            let mut record = event.fields.clone();
            record.insert("type".to_string(), Value::String(event.kind.to_string()));
            writeln!(file, "{}", serde_json::to_string(&record).unwrap_or_default())?;
        }
    }
    Ok(())
}

fn write_jsonl(path: &Path, pages: &[PageDescriptor]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    for page in pages {
        writeln!(file, "{}", serde_json::to_string(page).unwrap_or_default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::explore;
    use super::ExplorationConfig;
    use crate::error::ActivityError;
    use crate::telemetry::NoopTelemetry;
    use crate::telemetry::TelemetrySink;
    use runforge_core::PageDescriptor;
    use runforge_core::Section;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn page(id: &str, url: &str, title: &str) -> PageDescriptor {
        PageDescriptor {
            page_id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            section: Section::new("mission"),
            screenshot_path: None,
            dom_snapshot_path: None,
        }
    }

    fn telemetry() -> Arc<dyn TelemetrySink> {
        Arc::new(NoopTelemetry)
    }

    #[test]
    fn empty_site_map_is_invalid_input() {
        let dir = tempdir().unwrap();
        let result = explore(dir.path(), "RUN-1", &ExplorationConfig::default(), &[], &telemetry());
        assert!(matches!(result, Err(ActivityError::InvalidInput(_))));
    }

    #[test]
    fn budget_admits_the_threshold_fraction_rounded_down() {
        let dir = tempdir().unwrap();
        let pages: Vec<_> = (0..5)
            .map(|i| page(&format!("p{i}"), &format!("https://example.test/{i}"), "Page"))
            .collect();
        let config = ExplorationConfig {
            coverage_threshold: 0.8,
            ..ExplorationConfig::default()
        };
        let result = explore(dir.path(), "RUN-1", &config, &pages, &telemetry()).unwrap();
        assert_eq!(result.visited_pages.len(), 4);
        assert_eq!(result.skipped_pages.len(), 1);
        assert!((result.coverage_percent - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn destructive_keyword_is_blocklisted_before_rate_limit_applies() {
        let dir = tempdir().unwrap();
        let pages = vec![
            page("p0", "https://example.test/safe", "Safe"),
            page("p1", "https://example.test/admin/delete", "Danger"),
        ];
        let config = ExplorationConfig {
            coverage_threshold: 1.0,
            destructive_keywords: vec!["delete".to_string()],
            ..ExplorationConfig::default()
        };
        let result = explore(dir.path(), "RUN-1", &config, &pages, &telemetry()).unwrap();
        assert_eq!(result.visited_pages.len(), 1);
        assert_eq!(result.visited_pages[0].page_id, "p0");
        assert_eq!(result.skipped_pages.len(), 1);
        assert_eq!(result.skipped_pages[0].page_id, "p1");
        assert!(dir.path().join("exploration/guardrails.jsonl").exists());
    }

    #[test]
    fn rate_limit_stops_admitting_once_the_cap_is_reached() {
        let dir = tempdir().unwrap();
        let pages: Vec<_> = (0..3)
            .map(|i| page(&format!("p{i}"), &format!("https://example.test/{i}"), "Page"))
            .collect();
        let config = ExplorationConfig {
            coverage_threshold: 1.0,
            max_pages_per_run: 1,
            ..ExplorationConfig::default()
        };
        let result = explore(dir.path(), "RUN-1", &config, &pages, &telemetry()).unwrap();
        assert_eq!(result.visited_pages.len(), 1);
        assert_eq!(result.skipped_pages.len(), 2);
    }

    #[test]
    fn visited_plus_skipped_always_equals_total_pages() {
        let dir = tempdir().unwrap();
        let pages: Vec<_> = (0..7)
            .map(|i| page(&format!("p{i}"), &format!("https://example.test/{i}"), "Page"))
            .collect();
        let config = ExplorationConfig {
            coverage_threshold: 0.5,
            ..ExplorationConfig::default()
        };
        let result = explore(dir.path(), "RUN-1", &config, &pages, &telemetry()).unwrap();
        assert_eq!(result.visited_pages.len() + result.skipped_pages.len(), pages.len());
    }
}
