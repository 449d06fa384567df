//! Row selection: single, multiple, range and checkbox/radio toggles

use crate::data::datatable::DataRow;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    None,
    Single,
    Multiple,
}

/// Whether a context-menu row also becomes the selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMenuMode {
    #[default]
    Separate,
    Joint,
}

/// Modifier state of a row click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowClick {
    pub meta_key: bool,
    pub shift_key: bool,
}

impl RowClick {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn meta() -> Self {
        Self {
            meta_key: true,
            shift_key: false,
        }
    }

    pub fn shift() -> Self {
        Self {
            meta_key: false,
            shift_key: true,
        }
    }
}

/// Host predicate `(row, index) -> allowed`
pub type RowPredicate = Box<dyn Fn(&DataRow, usize) -> bool>;

/// Result of a selection operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Nothing changed (including vetoed rows)
    Unchanged,
    Changed,
    /// Select-all is owned by the host; this is the requested state
    SelectAllRequested(bool),
}

/// Tracks the selection value and its Data-Key index.
///
/// The selection list is canonical. `selection_keys` is derived from it
/// and brought back in sync before any mutating method returns.
pub struct SelectionManager {
    mode: SelectionMode,
    data_key: Option<String>,
    meta_key_selection: bool,
    selection: Vec<DataRow>,
    selection_keys: HashSet<String>,
    anchor_row_index: Option<usize>,
    range_row_index: Option<usize>,
    row_touched: bool,
    row_selectable: Option<RowPredicate>,
    select_all_binding: Option<bool>,
}

impl SelectionManager {
    pub fn new(mode: SelectionMode, data_key: Option<String>) -> Self {
        Self {
            mode,
            data_key,
            meta_key_selection: false,
            selection: Vec::new(),
            selection_keys: HashSet::new(),
            anchor_row_index: None,
            range_row_index: None,
            row_touched: false,
            row_selectable: None,
            select_all_binding: None,
        }
    }

    pub fn with_meta_key_selection(mut self, enabled: bool) -> Self {
        self.meta_key_selection = enabled;
        self
    }

    pub fn set_row_selectable(&mut self, predicate: Option<RowPredicate>) {
        self.row_selectable = predicate;
    }

    /// Bind the host-owned select-all state. While bound, `toggle_all`
    /// reports the request instead of changing the selection.
    pub fn bind_select_all(&mut self, state: Option<bool>) {
        self.select_all_binding = state;
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selection(&self) -> &[DataRow] {
        &self.selection
    }

    pub fn selection_keys(&self) -> &HashSet<String> {
        &self.selection_keys
    }

    pub fn anchor_row_index(&self) -> Option<usize> {
        self.anchor_row_index
    }

    pub fn reset_anchor(&mut self) {
        self.anchor_row_index = None;
        self.range_row_index = None;
    }

    /// The next click comes from a touch: meta-key semantics are off for it.
    pub fn touch(&mut self) {
        self.row_touched = true;
    }

    fn key_of(&self, row: &DataRow) -> Option<String> {
        self.data_key.as_deref().and_then(|key| row.key_for(key))
    }

    fn same_row(&self, a: &DataRow, b: &DataRow) -> bool {
        match self.data_key.as_deref() {
            Some(key) => match (a.key_for(key), b.key_for(key)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            None => a == b,
        }
    }

    pub fn is_selected(&self, row: &DataRow) -> bool {
        match self.key_of(row) {
            Some(key) => self.selection_keys.contains(&key),
            None => self.selection.iter().any(|s| self.same_row(s, row)),
        }
    }

    fn is_row_selectable(&self, row: &DataRow, index: usize) -> bool {
        self.row_selectable
            .as_ref()
            .map(|predicate| predicate(row, index))
            .unwrap_or(true)
    }

    fn rebuild_keys(&mut self) {
        self.selection_keys = match self.data_key.as_deref() {
            Some(key) => self.selection.iter().filter_map(|r| r.key_for(key)).collect(),
            None => HashSet::new(),
        };
    }

    fn add(&mut self, row: &DataRow) {
        if let Some(key) = self.key_of(row) {
            self.selection_keys.insert(key);
        }
        self.selection.push(row.clone());
    }

    fn remove(&mut self, row: &DataRow) {
        if let Some(pos) = self.selection.iter().position(|s| self.same_row(s, row)) {
            self.selection.remove(pos);
        }
        if let Some(key) = self.key_of(row) {
            self.selection_keys.remove(&key);
        }
    }

    fn replace_with(&mut self, row: &DataRow) {
        self.selection.clear();
        self.selection_keys.clear();
        self.add(row);
    }

    fn clear_all(&mut self) {
        self.selection.clear();
        self.selection_keys.clear();
    }

    /// Replace the whole selection (bound value or restored state)
    pub fn set_selection(&mut self, rows: Vec<DataRow>) {
        self.selection = match self.mode {
            SelectionMode::Single => rows.into_iter().take(1).collect(),
            _ => rows,
        };
        self.rebuild_keys();
    }

    pub fn clear(&mut self) -> SelectionOutcome {
        if self.selection.is_empty() {
            return SelectionOutcome::Unchanged;
        }
        self.clear_all();
        SelectionOutcome::Changed
    }

    /// Row click. `rows` is the processed (sorted, filtered) row sequence
    /// that `index` points into; shift ranges are taken from it.
    pub fn handle_row_click<R: Borrow<DataRow>>(
        &mut self,
        row: &DataRow,
        index: usize,
        click: RowClick,
        rows: &[R],
    ) -> SelectionOutcome {
        let outcome = self.row_click(row, index, click, rows);
        self.row_touched = false;
        outcome
    }

    fn row_click<R: Borrow<DataRow>>(
        &mut self,
        row: &DataRow,
        index: usize,
        click: RowClick,
        rows: &[R],
    ) -> SelectionOutcome {
        if self.mode == SelectionMode::None {
            return SelectionOutcome::Unchanged;
        }

        if self.mode == SelectionMode::Multiple && click.shift_key {
            if let Some(anchor) = self.anchor_row_index {
                let removed = self.clear_selection_range(rows);
                self.range_row_index = Some(index);
                return match self.select_range(anchor, index, rows) {
                    SelectionOutcome::Unchanged if removed > 0 => SelectionOutcome::Changed,
                    outcome => outcome,
                };
            }
        }

        let selected = self.is_selected(row);
        if !selected && !self.is_row_selectable(row, index) {
            debug!("Row {} vetoed by row-selectable predicate", index);
            return SelectionOutcome::Unchanged;
        }

        self.anchor_row_index = Some(index);
        self.range_row_index = Some(index);

        let meta_selection = !self.row_touched && self.meta_key_selection;
        if meta_selection {
            if selected && click.meta_key {
                match self.mode {
                    SelectionMode::Single => self.clear_all(),
                    _ => self.remove(row),
                }
            } else if self.mode == SelectionMode::Single || !click.meta_key {
                self.replace_with(row);
            } else {
                self.add(row);
            }
        } else if selected {
            match self.mode {
                SelectionMode::Single => self.clear_all(),
                _ => self.remove(row),
            }
        } else {
            match self.mode {
                SelectionMode::Single => self.replace_with(row),
                _ => self.add(row),
            }
        }

        debug!("Selection now holds {} rows", self.selection.len());
        SelectionOutcome::Changed
    }

    /// Deselect the previous shift range; returns how many rows it removed
    fn clear_selection_range<R: Borrow<DataRow>>(&mut self, rows: &[R]) -> usize {
        let (Some(anchor), Some(range)) = (self.anchor_row_index, self.range_row_index) else {
            return 0;
        };
        let (start, end) = (anchor.min(range), anchor.max(range));
        let before = self.selection.len();
        for row in rows.iter().take(end + 1).skip(start) {
            self.remove(row.borrow());
        }
        before - self.selection.len()
    }

    /// Select every row between two indices (inclusive, either order) of
    /// `rows`. Already selected rows are skipped; each new row is checked
    /// against the row-selectable predicate.
    pub fn select_range<R: Borrow<DataRow>>(
        &mut self,
        anchor_index: usize,
        target_index: usize,
        rows: &[R],
    ) -> SelectionOutcome {
        if self.mode != SelectionMode::Multiple {
            return SelectionOutcome::Unchanged;
        }

        let (start, end) = (
            anchor_index.min(target_index),
            anchor_index.max(target_index),
        );
        let mut added = 0;
        for (index, row) in rows.iter().enumerate().take(end + 1).skip(start) {
            let row = row.borrow();
            if self.is_selected(row) || !self.is_row_selectable(row, index) {
                continue;
            }
            self.add(row);
            added += 1;
        }

        debug!("Range {}..={} selected {} new rows", start, end, added);
        if added == 0 {
            return SelectionOutcome::Unchanged;
        }
        SelectionOutcome::Changed
    }

    /// Checkbox column toggle. Single mode keeps at most one row.
    pub fn toggle_with_checkbox(&mut self, row: &DataRow, index: usize) -> SelectionOutcome {
        if self.mode == SelectionMode::None {
            return SelectionOutcome::Unchanged;
        }
        if self.is_selected(row) {
            self.remove(row);
        } else {
            if !self.is_row_selectable(row, index) {
                return SelectionOutcome::Unchanged;
            }
            match self.mode {
                SelectionMode::Single => self.replace_with(row),
                _ => self.add(row),
            }
        }
        SelectionOutcome::Changed
    }

    pub fn toggle_with_radio(&mut self, row: &DataRow, index: usize) -> SelectionOutcome {
        if self.mode == SelectionMode::None {
            return SelectionOutcome::Unchanged;
        }
        if self.is_selected(row) {
            self.clear_all();
        } else {
            if !self.is_row_selectable(row, index) {
                return SelectionOutcome::Unchanged;
            }
            self.replace_with(row);
        }
        SelectionOutcome::Changed
    }

    /// Header checkbox. `candidates` are the rows in scope (current page or
    /// all processed rows) and `first_index` the index of the first one.
    /// With `page_only`, selected rows outside the candidates are kept.
    pub fn toggle_all<R: Borrow<DataRow>>(
        &mut self,
        check: bool,
        candidates: &[R],
        first_index: usize,
        page_only: bool,
    ) -> SelectionOutcome {
        if self.select_all_binding.is_some() {
            return SelectionOutcome::SelectAllRequested(check);
        }

        let mut selection: Vec<DataRow> = if page_only {
            self.selection
                .iter()
                .filter(|s| !candidates.iter().any(|c| self.same_row(s, c.borrow())))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        if check {
            selection.extend(
                candidates
                    .iter()
                    .enumerate()
                    .filter(|(i, row)| self.is_row_selectable((*row).borrow(), first_index + i))
                    .map(|(_, row)| row.borrow().clone()),
            );
        }

        self.selection = selection;
        self.rebuild_keys();
        SelectionOutcome::Changed
    }

    /// Whether every selectable candidate is selected (header checkbox state)
    pub fn all_selected<R: Borrow<DataRow>>(&self, candidates: &[R]) -> bool {
        if let Some(bound) = self.select_all_binding {
            return bound;
        }
        !candidates.is_empty() && candidates.iter().all(|row| self.is_selected(row.borrow()))
    }
}

impl fmt::Debug for SelectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionManager")
            .field("mode", &self.mode)
            .field("data_key", &self.data_key)
            .field("selected", &self.selection.len())
            .field("anchor_row_index", &self.anchor_row_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<DataRow> {
        (1..=5)
            .map(|i| DataRow::new().with("id", i).with("name", format!("row{}", i)))
            .collect()
    }

    fn keys_consistent(manager: &SelectionManager, rows: &[DataRow]) -> bool {
        rows.iter().all(|r| {
            let key = r.key_for("id").unwrap();
            manager.selection_keys().contains(&key) == manager.selection().contains(r)
        })
    }

    #[test]
    fn test_toggle_twice_restores_selection() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.handle_row_click(&data[1], 1, RowClick::plain(), &data);
        let before = manager.selection().to_vec();

        manager.handle_row_click(&data[3], 3, RowClick::plain(), &data);
        manager.handle_row_click(&data[3], 3, RowClick::plain(), &data);

        assert_eq!(manager.selection(), &before[..]);
        assert!(keys_consistent(&manager, &data));
    }

    #[test]
    fn test_single_mode_replaces() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Single, Some("id".into()));
        manager.handle_row_click(&data[0], 0, RowClick::plain(), &data);
        manager.handle_row_click(&data[2], 2, RowClick::plain(), &data);
        assert_eq!(manager.selection(), &[data[2].clone()]);
        manager.handle_row_click(&data[2], 2, RowClick::plain(), &data);
        assert!(manager.selection().is_empty());
        assert!(manager.selection_keys().is_empty());
    }

    #[test]
    fn test_meta_key_selection() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()))
            .with_meta_key_selection(true);

        manager.handle_row_click(&data[0], 0, RowClick::plain(), &data);
        manager.handle_row_click(&data[1], 1, RowClick::plain(), &data);
        assert_eq!(manager.selection().len(), 1);

        manager.handle_row_click(&data[2], 2, RowClick::meta(), &data);
        assert_eq!(manager.selection().len(), 2);

        manager.handle_row_click(&data[2], 2, RowClick::meta(), &data);
        assert_eq!(manager.selection(), &[data[1].clone()]);
        assert!(keys_consistent(&manager, &data));
    }

    #[test]
    fn test_touch_disables_meta_semantics_once() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()))
            .with_meta_key_selection(true);
        manager.handle_row_click(&data[0], 0, RowClick::plain(), &data);

        manager.touch();
        manager.handle_row_click(&data[1], 1, RowClick::plain(), &data);
        assert_eq!(manager.selection().len(), 2);

        manager.handle_row_click(&data[2], 2, RowClick::plain(), &data);
        assert_eq!(manager.selection(), &[data[2].clone()]);
    }

    #[test]
    fn test_select_range_is_commutative() {
        let data = rows();
        let mut forward = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        let mut backward = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        forward.select_range(1, 3, &data);
        backward.select_range(3, 1, &data);

        assert_eq!(forward.selection_keys(), backward.selection_keys());
        assert_eq!(forward.selection().len(), 3);
    }

    #[test]
    fn test_range_respects_predicate() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.set_row_selectable(Some(Box::new(|_: &DataRow, index: usize| index != 2)));
        manager.select_range(0, 4, &data);
        assert_eq!(manager.selection().len(), 4);
        assert!(!manager.is_selected(&data[2]));
    }

    #[test]
    fn test_shift_click_reselects_range() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.handle_row_click(&data[1], 1, RowClick::plain(), &data);
        manager.handle_row_click(&data[4], 4, RowClick::shift(), &data);
        assert_eq!(manager.selection().len(), 4);

        manager.handle_row_click(&data[2], 2, RowClick::shift(), &data);
        assert_eq!(manager.selection().len(), 2);
        assert!(manager.is_selected(&data[1]));
        assert!(manager.is_selected(&data[2]));
        assert!(keys_consistent(&manager, &data));
    }

    #[test]
    fn test_veto_is_silent() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, None);
        manager.set_row_selectable(Some(Box::new(|row: &DataRow, _: usize| {
            row.key_for("id").as_deref() != Some("1")
        })));
        assert_eq!(
            manager.handle_row_click(&data[0], 0, RowClick::plain(), &data),
            SelectionOutcome::Unchanged
        );
        assert_eq!(
            manager.toggle_with_checkbox(&data[0], 0),
            SelectionOutcome::Unchanged
        );
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn test_selection_without_data_key_uses_equality() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, None);
        manager.toggle_with_checkbox(&data[0], 0);
        assert!(manager.is_selected(&data[0].clone()));
        assert!(manager.selection_keys().is_empty());
    }

    #[test]
    fn test_toggle_all_page_only_keeps_other_pages() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.toggle_with_checkbox(&data[4], 4);

        manager.toggle_all(true, &data[0..2], 0, true);
        assert_eq!(manager.selection().len(), 3);
        assert!(manager.all_selected(&data[0..2]));

        manager.toggle_all(false, &data[0..2], 0, true);
        assert_eq!(manager.selection(), &[data[4].clone()]);
        assert!(keys_consistent(&manager, &data));
    }

    #[test]
    fn test_toggle_all_defers_to_bound_flag() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.bind_select_all(Some(false));
        assert_eq!(
            manager.toggle_all(true, &data, 0, false),
            SelectionOutcome::SelectAllRequested(true)
        );
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn test_range_with_nothing_new_is_unchanged() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Multiple, Some("id".into()));
        manager.set_row_selectable(Some(Box::new(|_: &DataRow, index: usize| index != 3)));
        assert_eq!(manager.select_range(3, 3, &data), SelectionOutcome::Unchanged);

        assert_eq!(manager.select_range(0, 1, &data), SelectionOutcome::Changed);
        assert_eq!(manager.select_range(1, 0, &data), SelectionOutcome::Unchanged);
        assert_eq!(manager.selection().len(), 2);
    }

    #[test]
    fn test_checkbox_in_single_mode_replaces() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Single, Some("id".into()));
        manager.toggle_with_checkbox(&data[0], 0);
        manager.toggle_with_checkbox(&data[2], 2);
        assert_eq!(manager.selection(), &[data[2].clone()]);
        assert!(keys_consistent(&manager, &data));
    }

    #[test]
    fn test_none_mode_ignores_toggles() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::None, Some("id".into()));
        assert_eq!(
            manager.toggle_with_checkbox(&data[0], 0),
            SelectionOutcome::Unchanged
        );
        assert_eq!(
            manager.toggle_with_radio(&data[0], 0),
            SelectionOutcome::Unchanged
        );
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn test_radio() {
        let data = rows();
        let mut manager = SelectionManager::new(SelectionMode::Single, Some("id".into()));
        manager.toggle_with_radio(&data[0], 0);
        manager.toggle_with_radio(&data[1], 1);
        assert_eq!(manager.selection(), &[data[1].clone()]);
        manager.toggle_with_radio(&data[1], 1);
        assert!(manager.selection().is_empty());
    }
}
