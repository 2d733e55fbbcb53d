// crates/runforge-workflow/src/crawl.rs
// ============================================================================
// Module: Runforge Crawl Activity
// Description: Deterministic breadth-first link crawl with guardrails.
// Purpose: Implement the crawl phase's BFS algorithm and artifact writes,
//          independent of the workflow engine that invokes it.
// Dependencies: runforge-core::{PageDescriptor, Adjacency}, crate::telemetry
// ============================================================================

//! ## Overview
//! Implements spec.md §4.4 exactly: a breadth-first traversal over an
//! adjacency map, deduped by lowercased URL, with a blocklist guardrail and
//! a skip-keyword filter that continue the traversal, and a rate-limit
//! guardrail that breaks it entirely. Grounded on `gazeqa/bfs.py`'s
//! `BFSCrawler`, with the guardrail split added from spec.md (the original
//! only had a skip-keyword filter).

use std::collections::HashSet;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use runforge_core::Adjacency;
use runforge_core::PageDescriptor;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ActivityError;
use crate::telemetry::TelemetrySink;

/// Configuration for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum BFS depth (seeds are depth 0).
    pub max_depth: u32,
    /// URL substrings that cause a page to be skipped (not a guardrail).
    pub skip_keywords: Vec<String>,
    /// Keywords that force a page into the blocklist guardrail.
    pub destructive_keywords: Vec<String>,
    /// Visited-count cap; `0` means unlimited.
    pub max_nodes_per_run: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            skip_keywords: Vec::new(),
            destructive_keywords: Vec::new(),
            max_nodes_per_run: 0,
        }
    }
}

/// One visited node in the crawl result, with its BFS linkage.
#[derive(Debug, Clone, Serialize)]
pub struct VisitedPage {
    pub page: PageDescriptor,
    pub depth: u32,
    pub parent: Option<String>,
}

/// One excluded node, with the reason it was excluded.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPage {
    pub page: PageDescriptor,
    pub reason: &'static str,
}

/// Outcome of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub visited: Vec<VisitedPage>,
    pub skipped: Vec<SkippedPage>,
}

/// Runs the breadth-first crawl algorithm from `seeds` over `adjacency`,
/// persisting artifacts under `run_dir/bfs/` and emitting guardrail events
/// through `telemetry`.
///
/// # Errors
/// Returns [`ActivityError::InvalidInput`] if `seeds` is empty, or
/// [`ActivityError::Terminal`] on an I/O failure while persisting artifacts.
pub fn crawl(
    run_dir: &Path,
    run_id: &str,
    config: &CrawlConfig,
    seeds: &[PageDescriptor],
    adjacency: &Adjacency,
    telemetry: &Arc<dyn TelemetrySink>,
) -> Result<CrawlResult, ActivityError> {
    if seeds.is_empty() {
        return Err(ActivityError::InvalidInput("seeds must contain at least one page".to_string()));
    }

    let mut queue: VecDeque<(PageDescriptor, u32, Option<String>)> =
        seeds.iter().cloned().map(|page| (page, 0, None)).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut visited = Vec::new();
    let mut skipped = Vec::new();
    let mut guardrails = Vec::new();

    'bfs: while let Some((page, depth, parent)) = queue.pop_front() {
        let key = page.dedup_key();
        if seen.contains(&key) {
            continue;
        }

        if config.max_nodes_per_run > 0 && visited.len() as u32 >= config.max_nodes_per_run {
            guardrails.push(guardrail_event("rate_limit", "crawl", &page));
            skipped.push(SkippedPage { page, reason: "rate_limited" });
            break 'bfs;
        }

        if page.matches_any_keyword(&config.destructive_keywords) {
            guardrails.push(guardrail_event("blocklist", "crawl", &page));
            skipped.push(SkippedPage { page, reason: "destructive_blocklist" });
            continue;
        }

        if config.skip_keywords.iter().any(|keyword| page.url.to_lowercase().contains(&keyword.to_lowercase())) {
            skipped.push(SkippedPage { page, reason: "skip_keyword_match" });
            continue;
        }

        seen.insert(key.clone());
        let page_id = page.page_id.clone();
        if depth < config.max_depth {
            if let Some(children) = adjacency.get(&page_id) {
                for child in children {
                    if !seen.contains(&child.dedup_key()) {
                        queue.push_back((child.clone(), depth + 1, Some(page_id.clone())));
                    }
                }
            }
        }
        visited.push(VisitedPage { page, depth, parent });
    }

    let bfs_dir = run_dir.join("bfs");
    fs::create_dir_all(&bfs_dir).map_err(|err| ActivityError::Terminal(err.to_string()))?;
    persist(&bfs_dir, run_id, &visited, &skipped, &guardrails)
        .map_err(|err| ActivityError::Terminal(err.to_string()))?;

    for event in &guardrails {
        telemetry.emit(run_id, &format!("guardrail.{}", event.kind), event.fields.clone());
    }

    Ok(CrawlResult { visited, skipped })
}

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
    visited: &[VisitedPage],
    skipped: &[SkippedPage],
    guardrails: &[GuardrailEvent],
) -> std::io::Result<()> {
    let mut page_map = fs::File::create(dir.join("page_map.jsonl"))?;
    for entry in visited {
        writeln!(page_map, "{}", serde_json::to_string(entry).unwrap_or_default())?;
    }

    let skipped_links: Vec<_> = skipped
        .iter()
        .map(|entry| {
            serde_json::json!({
                "page_id": entry.page.page_id,
                "url": entry.page.url,
                "reason": entry.reason,
            })
        })
        .collect();
    fs::write(
        dir.join("skipped_links.json"),
        serde_json::to_string_pretty(&skipped_links).unwrap_or_default(),
    )?;

    let coverage_merge = serde_json::json!({
        "run_id": run_id,
        "visited_count": visited.len(),
        "skipped_count": skipped.len(),
    });
    fs::write(
        dir.join("coverage_merge.json"),
        serde_json::to_string_pretty(&coverage_merge).unwrap_or_default(),
    )?;

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

#[cfg(test)]
mod tests {
    use super::crawl;
    use super::CrawlConfig;
    use crate::error::ActivityError;
    use crate::telemetry::NoopTelemetry;
    use crate::telemetry::TelemetrySink;
    use runforge_core::Adjacency;
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
    fn empty_seeds_is_invalid_input() {
        let dir = tempdir().unwrap();
        let result = crawl(dir.path(), "RUN-1", &CrawlConfig::default(), &[], &Adjacency::new(), &telemetry());
        assert!(matches!(result, Err(ActivityError::InvalidInput(_))));
    }

    #[test]
    fn breadth_first_order_respects_max_depth() {
        let dir = tempdir().unwrap();
        let home = page("home", "https://example.test/home", "Home");
        let about = page("about", "https://example.test/about", "About");
        let contact = page("contact", "https://example.test/contact", "Contact");
        let mut adjacency = Adjacency::new();
        adjacency.insert("home".to_string(), vec![about.clone(), contact.clone()]);

        let config = CrawlConfig { max_depth: 1, ..CrawlConfig::default() };
        let result = crawl(dir.path(), "RUN-1", &config, &[home], &adjacency, &telemetry()).unwrap();

        assert_eq!(result.visited.len(), 3);
        assert_eq!(result.visited[0].depth, 0);
        assert_eq!(result.visited[1].page.page_id, "about");
        assert_eq!(result.visited[1].parent.as_deref(), Some("home"));
    }

    #[test]
    fn rate_limit_breaks_the_entire_traversal() {
        let dir = tempdir().unwrap();
        let home = page("home", "https://example.test/home", "Home");
        let about = page("about", "https://example.test/about", "About");
        let contact = page("contact", "https://example.test/contact", "Contact");
        let mut adjacency = Adjacency::new();
        adjacency.insert("home".to_string(), vec![about, contact]);

        let config = CrawlConfig { max_depth: 2, max_nodes_per_run: 1, ..CrawlConfig::default() };
        let result = crawl(dir.path(), "RUN-1", &config, &[home], &adjacency, &telemetry()).unwrap();

        assert_eq!(result.visited.len(), 1);
        let guardrails = std::fs::read_to_string(dir.path().join("bfs/guardrails.jsonl")).unwrap();
        let first_line: serde_json::Value = serde_json::from_str(guardrails.lines().next().unwrap()).unwrap();
        assert_eq!(first_line["type"], "rate_limit");
    }

    #[test]
    fn destructive_keyword_is_blocklisted_and_traversal_continues() {
        let dir = tempdir().unwrap();
        let home = page("home", "https://example.test/home", "Home");
        let danger = page("danger", "https://example.test/admin/delete", "Danger");
        let about = page("about", "https://example.test/about", "About");
        let mut adjacency = Adjacency::new();
        adjacency.insert("home".to_string(), vec![danger, about]);

        let config = CrawlConfig {
            max_depth: 1,
            destructive_keywords: vec!["delete".to_string()],
            ..CrawlConfig::default()
        };
        let result = crawl(dir.path(), "RUN-1", &config, &[home], &adjacency, &telemetry()).unwrap();

        assert_eq!(result.visited.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, "destructive_blocklist");
    }

    #[test]
    fn skip_keyword_excludes_without_guardrail() {
        let dir = tempdir().unwrap();
        let home = page("home", "https://example.test/home", "Home");
        let logout = page("logout", "https://example.test/logout", "Logout");
        let mut adjacency = Adjacency::new();
        adjacency.insert("home".to_string(), vec![logout]);

        let config = CrawlConfig {
            max_depth: 1,
            skip_keywords: vec!["logout".to_string()],
            ..CrawlConfig::default()
        };
        let result = crawl(dir.path(), "RUN-1", &config, &[home], &adjacency, &telemetry()).unwrap();

        assert_eq!(result.visited.len(), 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, "skip_keyword_match");
        assert!(!dir.path().join("bfs/guardrails.jsonl").exists());
    }

    #[test]
    fn duplicate_urls_across_branches_are_deduped() {
        let dir = tempdir().unwrap();
        let home = page("home", "https://example.test/home", "Home");
        let hub_a = page("hub-a", "https://example.test/hub", "Hub A");
        let hub_b = page("hub-b", "https://example.test/hub", "Hub B");
        let mut adjacency = Adjacency::new();
        adjacency.insert("home".to_string(), vec![hub_a, hub_b]);

        let config = CrawlConfig { max_depth: 1, ..CrawlConfig::default() };
        let result = crawl(dir.path(), "RUN-1", &config, &[home], &adjacency, &telemetry()).unwrap();

        assert_eq!(result.visited.len(), 2);
    }
}
