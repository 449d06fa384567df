//! Page window tracking and lazy-load request assembly

use crate::data::datatable::DataValue;
use crate::table::filter::{FilterEngine, FilterMetadata};
use crate::table::sort::{SortEngine, SortMeta, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, warn};

/// Everything a lazy data source needs to produce the next window of rows.
///
/// `request_id` increases with every request so the host can drop
/// responses to requests that have been superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyLoadEvent {
    pub request_id: u64,
    pub first: usize,
    pub rows: usize,
    pub last: usize,
    pub sort_field: Option<String>,
    pub sort_order: SortOrder,
    pub multi_sort_meta: Option<Vec<SortMeta>>,
    pub filters: BTreeMap<String, FilterMetadata>,
    pub global_filter: Option<DataValue>,
}

#[derive(Debug, Clone)]
pub struct PaginationCoordinator {
    first: usize,
    rows: usize,
    total_records: usize,
    lazy: bool,
    paginator: bool,
    last_request_id: u64,
}

impl PaginationCoordinator {
    pub fn new(rows: usize, lazy: bool, paginator: bool) -> Self {
        Self {
            first: 0,
            rows,
            total_records: 0,
            lazy,
            paginator,
            last_request_id: 0,
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_paginated(&self) -> bool {
        self.paginator
    }

    /// Move the window. Returns false when nothing changed.
    pub fn set_page(&mut self, first: usize, rows: usize) -> bool {
        if self.first == first && self.rows == rows {
            return false;
        }
        debug!("Page window {} -> {} ({} rows)", self.first, first, rows);
        self.first = first;
        self.rows = rows;
        true
    }

    pub fn reset_first(&mut self) {
        self.first = 0;
    }

    /// Store the total record count. Returns false when unchanged.
    pub fn set_total_records(&mut self, total: usize) -> bool {
        if self.total_records == total {
            return false;
        }
        self.total_records = total;
        true
    }

    /// Pull `first` back onto the last page when the data shrank under it
    pub fn clamp_to_total(&mut self) {
        if self.rows == 0 || self.first < self.total_records || self.first == 0 {
            return;
        }
        let last_page = self.total_records.saturating_sub(1) / self.rows;
        self.first = last_page * self.rows;
    }

    pub fn page_count(&self) -> usize {
        if self.rows == 0 {
            return 0;
        }
        self.total_records.div_ceil(self.rows)
    }

    pub fn current_page(&self) -> usize {
        if self.rows == 0 {
            0
        } else {
            self.first / self.rows
        }
    }

    /// Indices of `len` processed rows that fall on the current page.
    /// Lazy data is already one page, and an unpaginated grid shows all.
    pub fn page_range(&self, len: usize) -> Range<usize> {
        if self.lazy || !self.paginator {
            return 0..len;
        }
        let start = self.first.min(len);
        let end = self.first.saturating_add(self.rows).min(len);
        start..end
    }

    /// Assemble a request from the current sort, filter and window state
    pub fn build_lazy_load_request(
        &mut self,
        sort: &SortEngine,
        filter: &FilterEngine,
    ) -> LazyLoadEvent {
        self.last_request_id += 1;
        let request = LazyLoadEvent {
            request_id: self.last_request_id,
            first: self.first,
            rows: self.rows,
            last: self.first + self.rows,
            sort_field: sort.sort_field().map(str::to_string),
            sort_order: sort.sort_order(),
            multi_sort_meta: sort.multi_sort_meta().map(<[SortMeta]>::to_vec),
            filters: filter.active_filters(),
            global_filter: filter.global_filter_value().cloned(),
        };
        debug!(
            "Lazy load request #{} for rows {}..{}",
            request.request_id, request.first, request.last
        );
        request
    }

    pub fn last_request_id(&self) -> u64 {
        self.last_request_id
    }

    /// Whether a response belongs to the most recent request
    pub fn is_latest(&self, request_id: u64) -> bool {
        if request_id != self.last_request_id {
            warn!(
                "Discarding lazy response #{}, latest request is #{}",
                request_id, self.last_request_id
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::filter_service::match_modes::CONTAINS;
    use crate::table::sort::SortMode;

    #[test]
    fn test_page_range_slices_processed_rows() {
        let mut pager = PaginationCoordinator::new(10, false, true);
        assert_eq!(pager.page_range(25), 0..10);
        pager.set_page(20, 10);
        assert_eq!(pager.page_range(25), 20..25);
        pager.set_page(40, 10);
        assert_eq!(pager.page_range(25), 25..25);
    }

    #[test]
    fn test_unpaginated_shows_everything() {
        let pager = PaginationCoordinator::new(10, false, false);
        assert_eq!(pager.page_range(25), 0..25);
    }

    #[test]
    fn test_clamp_to_total() {
        let mut pager = PaginationCoordinator::new(10, false, true);
        pager.set_page(30, 10);
        pager.set_total_records(15);
        pager.clamp_to_total();
        assert_eq!(pager.first(), 10);
        assert_eq!(pager.page_count(), 2);
        assert_eq!(pager.current_page(), 1);
    }

    #[test]
    fn test_lazy_request_reflects_latest_state() {
        let mut pager = PaginationCoordinator::new(20, true, true);
        let mut sort = SortEngine::new(SortMode::Single, SortOrder::Ascending);
        let mut filter = FilterEngine::new(300);

        let first = pager.build_lazy_load_request(&sort, &filter);
        assert_eq!(first.sort_field, None);
        assert!(first.filters.is_empty());

        sort.click("name", false);
        sort.click("name", false);
        filter.set_constraint("name", DataValue::from("a"), Some(CONTAINS));
        pager.set_page(40, 20);

        let second = pager.build_lazy_load_request(&sort, &filter);
        assert_eq!(second.request_id, first.request_id + 1);
        assert_eq!(second.first, 40);
        assert_eq!(second.last, 60);
        assert_eq!(second.sort_field.as_deref(), Some("name"));
        assert_eq!(second.sort_order, SortOrder::Descending);
        assert!(second.filters.contains_key("name"));

        assert!(!pager.is_latest(first.request_id));
        assert!(pager.is_latest(second.request_id));
    }

    #[test]
    fn test_lazy_request_json_shape() {
        let mut pager = PaginationCoordinator::new(10, true, true);
        let sort = SortEngine::new(SortMode::Single, SortOrder::Ascending);
        let filter = FilterEngine::new(0);
        let json = serde_json::to_value(pager.build_lazy_load_request(&sort, &filter)).unwrap();

        assert_eq!(json["first"], 0);
        assert_eq!(json["rows"], 10);
        assert_eq!(json["sortOrder"], 1);
        assert!(json["sortField"].is_null());
        assert!(json["globalFilter"].is_null());
        assert_eq!(json["requestId"], 1);
    }
}
