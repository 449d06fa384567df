//! Single- and multi-field row ordering

use crate::data::datatable::DataRow;
use crate::data::datavalue_compare::compare_for_sort;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Sort direction, persisted as `1` / `-1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    /// Apply this direction to an ascending comparison result
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

impl From<SortOrder> for i8 {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

impl TryFrom<i8> for SortOrder {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SortOrder::Ascending),
            -1 => Ok(SortOrder::Descending),
            other => Err(format!("invalid sort order {other}, expected 1 or -1")),
        }
    }
}

/// One entry of a multi-field sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortMeta {
    pub field: String,
    pub order: SortOrder,
}

impl SortMeta {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Single,
    Multiple,
}

/// What a completed sort reports on the sort-changed channel
#[derive(Debug, Clone, PartialEq)]
pub enum SortEvent {
    Single(SortMeta),
    Multiple(Vec<SortMeta>),
}

/// Owns the active sort criteria and orders rows by it.
///
/// Sorting uses `slice::sort_by`, which is stable, so equal rows keep
/// their relative order across repeated sorts.
#[derive(Debug, Clone)]
pub struct SortEngine {
    mode: SortMode,
    sort_field: Option<String>,
    sort_order: SortOrder,
    default_sort_order: SortOrder,
    multi_sort_meta: Option<Vec<SortMeta>>,
    group_field: Option<String>,
    group_order: SortOrder,
    locale: Option<String>,
    restoring: bool,
}

impl SortEngine {
    pub fn new(mode: SortMode, default_sort_order: SortOrder) -> Self {
        Self {
            mode,
            sort_field: None,
            sort_order: default_sort_order,
            default_sort_order,
            multi_sort_meta: None,
            group_field: None,
            group_order: SortOrder::Ascending,
            locale: None,
            restoring: false,
        }
    }

    /// Group rows by `field` before any other ordering
    pub fn with_group_field(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.group_field = Some(field.into());
        self.group_order = order;
        self
    }

    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn mode(&self) -> SortMode {
        self.mode
    }

    pub fn sort_field(&self) -> Option<&str> {
        self.sort_field.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn multi_sort_meta(&self) -> Option<&[SortMeta]> {
        self.multi_sort_meta.as_deref()
    }

    /// Header click. Single mode flips the order on a repeated field;
    /// multiple mode replaces the list unless `meta_key` is held.
    pub fn click(&mut self, field: &str, meta_key: bool) {
        match self.mode {
            SortMode::Single => {
                self.sort_order = if self.sort_field.as_deref() == Some(field) {
                    self.sort_order.reversed()
                } else {
                    self.default_sort_order
                };
                self.sort_field = Some(field.to_string());
            }
            SortMode::Multiple => {
                let default_order = self.default_sort_order;
                let metas = self.multi_sort_meta.get_or_insert_with(Vec::new);
                match metas.iter().position(|m| m.field == field) {
                    Some(pos) if meta_key => {
                        metas[pos].order = metas[pos].order.reversed();
                    }
                    Some(pos) => {
                        let order = metas[pos].order.reversed();
                        *metas = vec![SortMeta::new(field, order)];
                    }
                    None => {
                        if !meta_key {
                            metas.clear();
                        }
                        metas.push(SortMeta::new(field, default_order));
                    }
                }
            }
        }
        debug!("Sort click on {} (meta: {}) -> {:?}", field, meta_key, self.event());
    }

    /// Sort by one field. In multiple mode this replaces the field list.
    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        match self.mode {
            SortMode::Single => {
                self.sort_field = Some(field.into());
                self.sort_order = order;
            }
            SortMode::Multiple => self.set_multi_sort_meta(vec![SortMeta::new(field, order)]),
        }
    }

    /// Set the multi-field sort; repeated fields keep their first entry.
    pub fn set_multi_sort_meta(&mut self, metas: Vec<SortMeta>) {
        let mut unique: Vec<SortMeta> = Vec::with_capacity(metas.len());
        for meta in metas {
            if !unique.iter().any(|m| m.field == meta.field) {
                unique.push(meta);
            }
        }
        self.multi_sort_meta = if unique.is_empty() { None } else { Some(unique) };
    }

    /// Clear sorting back to defaults
    pub fn reset(&mut self) {
        self.sort_field = None;
        self.sort_order = self.default_sort_order;
        self.multi_sort_meta = None;
    }

    /// Re-hydrate persisted sort state; the next `apply` is flagged as a restore.
    pub fn restore(
        &mut self,
        field: Option<String>,
        order: Option<SortOrder>,
        multi_sort_meta: Option<Vec<SortMeta>>,
    ) {
        if let Some(field) = field {
            self.sort_field = Some(field);
            self.sort_order = order.unwrap_or(self.default_sort_order);
            self.restoring = true;
        }
        if let Some(metas) = multi_sort_meta {
            self.set_multi_sort_meta(metas);
            self.restoring = true;
        }
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn finish_restore(&mut self) {
        self.restoring = false;
    }

    /// Whether a column header should show as sorted
    pub fn is_sorted(&self, field: &str) -> bool {
        match self.mode {
            SortMode::Single => self.sort_field.as_deref() == Some(field),
            SortMode::Multiple => self
                .multi_sort_meta
                .as_ref()
                .map(|metas| metas.iter().any(|m| m.field == field))
                .unwrap_or(false),
        }
    }

    /// Whether any ordering would be applied
    pub fn is_active(&self) -> bool {
        !self.effective_specs().is_empty()
    }

    /// The ordering actually applied, group field first when configured
    pub fn effective_specs(&self) -> Vec<SortMeta> {
        let group = self
            .group_field
            .as_ref()
            .map(|g| SortMeta::new(g.clone(), self.group_order));

        match self.mode {
            SortMode::Single => match (&self.sort_field, group) {
                (Some(field), Some(group)) if *field != group.field => {
                    vec![group, SortMeta::new(field.clone(), self.sort_order)]
                }
                (Some(field), _) => vec![SortMeta::new(field.clone(), self.sort_order)],
                (None, Some(group)) => vec![group],
                (None, None) => Vec::new(),
            },
            SortMode::Multiple => {
                let mut specs = self.multi_sort_meta.clone().unwrap_or_default();
                if let Some(group) = group {
                    if specs.first().map(|m| m.field != group.field).unwrap_or(true) {
                        specs.retain(|m| m.field != group.field);
                        specs.insert(0, group);
                    }
                }
                specs
            }
        }
    }

    /// Order rows by one field. A configured group field that differs from
    /// `field` ranks first, then `field`.
    pub fn sort_single(&self, rows: &mut [DataRow], field: &str, order: SortOrder) {
        if let Some(group) = self.group_field.as_deref().filter(|g| *g != field) {
            let specs = [
                SortMeta::new(group, self.group_order),
                SortMeta::new(field, order),
            ];
            self.sort_multiple(rows, &specs);
            return;
        }

        let locale = self.locale.as_deref();
        rows.sort_by(|a, b| order.apply(compare_for_sort(a.resolve(field), b.resolve(field), locale)));
    }

    /// Order rows by each spec in turn; later specs only break ties.
    pub fn sort_multiple(&self, rows: &mut [DataRow], specs: &[SortMeta]) {
        rows.sort_by(|a, b| self.compare_rows(a, b, specs));
    }

    pub fn compare_rows(&self, a: &DataRow, b: &DataRow, specs: &[SortMeta]) -> Ordering {
        let locale = self.locale.as_deref();
        for spec in specs {
            let ordering = spec.order.apply(compare_for_sort(
                a.resolve(&spec.field),
                b.resolve(&spec.field),
                locale,
            ));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Positions of `rows` in the order `apply` would leave them, as
    /// indices into the unsorted slice.
    pub fn sorted_indices(&self, rows: &[DataRow]) -> Vec<usize> {
        let specs = self.effective_specs();
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| self.compare_rows(&rows[a], &rows[b], &specs));
        order
    }

    /// Sort `rows` by the current criteria and clear the restore flag.
    /// Returns the notification to publish, or `None` if nothing is sorted.
    pub fn apply(&mut self, rows: &mut [DataRow]) -> Option<SortEvent> {
        self.restoring = false;
        match self.mode {
            SortMode::Single => {
                let (field, order) = match &self.sort_field {
                    Some(field) => (field.clone(), self.sort_order),
                    None => {
                        let group = self.group_field.clone()?;
                        (group, self.group_order)
                    }
                };
                debug!("Sorting {} rows by {} ({:?})", rows.len(), field, order);
                self.sort_single(rows, &field, order);
                Some(SortEvent::Single(SortMeta::new(field, order)))
            }
            SortMode::Multiple => {
                let specs = self.effective_specs();
                if specs.is_empty() {
                    return None;
                }
                debug!("Sorting {} rows by {} fields", rows.len(), specs.len());
                self.sort_multiple(rows, &specs);
                Some(SortEvent::Multiple(specs))
            }
        }
    }

    /// The current sort as a notification payload
    pub fn event(&self) -> Option<SortEvent> {
        match self.mode {
            SortMode::Single => self
                .sort_field
                .as_ref()
                .map(|f| SortEvent::Single(SortMeta::new(f.clone(), self.sort_order))),
            SortMode::Multiple => self.multi_sort_meta.clone().map(SortEvent::Multiple),
        }
    }
}
