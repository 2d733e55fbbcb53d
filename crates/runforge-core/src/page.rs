// crates/runforge-core/src/page.rs
// ============================================================================
// Module: Runforge Page Descriptors
// Description: Page and adjacency types shared by exploration and crawl.
// Purpose: Give both activities one page representation and one graph shape.
// Dependencies: serde, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! A `PageDescriptor` is a node in the site graph the exploration and crawl
//! activities walk. `Section` is an open-ended label (`mission`, `admin`,
//! `team`, …) rather than a closed enum, since the site map builder may
//! introduce new sections per target application.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// An open-ended section label for a page (`"mission"`, `"admin"`, `"team"`, …).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Section(String);

impl Section {
    /// Wraps a raw section label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the section label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single node in the site graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Stable slug, unique within a run.
    pub page_id: String,
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Section this page belongs to.
    pub section: Section,
    /// Path to a captured screenshot, relative to the run directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    /// Path to a captured DOM snapshot, relative to the run directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot_path: Option<String>,
}

impl PageDescriptor {
    /// Returns the lowercased URL, used as the BFS/exploration dedup key.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        self.url.to_lowercase()
    }

    /// Returns `true` if `keywords` (case-insensitive) appear in the URL or title.
    #[must_use]
    pub fn matches_any_keyword(&self, keywords: &[String]) -> bool {
        let url_lower = self.url.to_lowercase();
        let title_lower = self.title.to_lowercase();
        keywords.iter().any(|keyword| {
            let needle = keyword.to_lowercase();
            url_lower.contains(&needle) || title_lower.contains(&needle)
        })
    }
}

/// Adjacency mapping from `page_id` to its ordered outgoing edges.
pub type Adjacency = BTreeMap<String, Vec<PageDescriptor>>;

#[cfg(test)]
mod tests {
    use super::PageDescriptor;
    use super::Section;

    fn page(url: &str, title: &str) -> PageDescriptor {
        PageDescriptor {
            page_id: "p".to_string(),
            url: url.to_string(),
            title: title.to_string(),
            section: Section::new("mission"),
            screenshot_path: None,
            dom_snapshot_path: None,
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive_across_url_and_title() {
        let page = page("https://example.test/Admin/Delete", "Danger Zone");
        assert!(page.matches_any_keyword(&["delete".to_string()]));
        assert!(page.matches_any_keyword(&["danger".to_string()]));
        assert!(!page.matches_any_keyword(&["logout".to_string()]));
    }

    #[test]
    fn dedup_key_is_lowercased() {
        let page = page("HTTPS://Example.Test/Home", "Home");
        assert_eq!(page.dedup_key(), "https://example.test/home");
    }
}
