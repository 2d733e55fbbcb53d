// crates/runforge-server/src/pagination.rs
// ============================================================================
// Module: Runforge Pagination
// Description: Shared offset/limit pagination for list endpoints.
// Purpose: Give `/runs` and `/runs/{id}/artifacts` one windowing and
//          response-envelope implementation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Grounded on `gazeqa/api.py::_send_paginated_runs`: `offset`/`limit` are
//! clamped (`offset >= 0`, `limit` in `[1, max]`), and the response carries
//! `offset`, `limit`, `total`, `next_offset`, `previous_offset` alongside
//! the windowed `items`.

use serde::Deserialize;
use serde::Serialize;

/// Raw, caller-supplied pagination query parameters.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    /// Zero-based offset into the full result set.
    pub offset: Option<i64>,
    /// Maximum number of items to return.
    pub limit: Option<i64>,
}

/// A paginated response envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    /// The windowed items.
    pub items: Vec<T>,
    /// The offset this page started at.
    pub offset: usize,
    /// The limit applied to this page.
    pub limit: usize,
    /// Total number of items across every page.
    pub total: usize,
    /// Offset of the next page, if one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    /// Offset of the previous page, if one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_offset: Option<usize>,
}

/// Windows `items` by `query`, clamping `offset` to `>= 0` and `limit` to
/// `[1, max_limit]`.
pub fn paginate<T>(items: Vec<T>, query: &PageQuery, max_limit: usize) -> Page<T> {
    let total = items.len();
    let offset = query.offset.unwrap_or(0).max(0) as usize;
    let limit = query.limit.unwrap_or(max_limit as i64).clamp(1, max_limit as i64) as usize;

    let windowed: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    let next_offset = (offset + windowed.len() < total).then_some(offset + limit);
    let previous_offset = (offset > 0).then_some(offset.saturating_sub(limit));

    Page { items: windowed, offset, limit, total, next_offset, previous_offset }
}

#[cfg(test)]
mod tests {
    use super::paginate;
    use super::PageQuery;

    #[test]
    fn middle_page_has_both_neighbors() {
        let items: Vec<i32> = (0..10).collect();
        let page = paginate(items, &PageQuery { offset: Some(4), limit: Some(2) }, 100);
        assert_eq!(page.items, vec![4, 5]);
        assert_eq!(page.next_offset, Some(6));
        assert_eq!(page.previous_offset, Some(2));
    }

    #[test]
    fn first_page_has_no_previous_offset() {
        let items: Vec<i32> = (0..10).collect();
        let page = paginate(items, &PageQuery::default(), 3);
        assert_eq!(page.previous_offset, None);
        assert_eq!(page.next_offset, Some(3));
    }

    #[test]
    fn last_page_has_no_next_offset() {
        let items: Vec<i32> = (0..5).collect();
        let page = paginate(items, &PageQuery { offset: Some(3), limit: Some(10) }, 100);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn limit_is_clamped_to_max() {
        let items: Vec<i32> = (0..200).collect();
        let page = paginate(items, &PageQuery { offset: Some(0), limit: Some(9999) }, 100);
        assert_eq!(page.limit, 100);
        assert_eq!(page.items.len(), 100);
    }
}
