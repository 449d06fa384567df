//! The grid controller: owns the bound rows and every state component,
//! and runs each user action through mutate, recompute, notify and persist.

use crate::config::config::Config;
use crate::data::data_exporter::{DataExporter, ExportFunction, ExportOptions, ExportScope};
use crate::data::datatable::{ColumnDescriptor, DataRow, DataValue};
use crate::error::Result;
use crate::state::dispatcher::{EventChannel, SubscriptionId};
use crate::state::events::{Channel, GridEvent};
use crate::table::columns::ColumnLayout;
use crate::table::edit::{EditOutcome, EditSession, EditSessionManager, EditValidator, RowEditablePredicate};
use crate::table::expansion::RowExpansion;
use crate::table::filter::{FilterConstraint, FilterEngine, GLOBAL_FIELD};
use crate::table::filter_service::FilterService;
use crate::table::pagination::{LazyLoadEvent, PaginationCoordinator};
use crate::table::persistence::{PersistedSelection, PersistedSnapshot, StatePersistence, StorageHost};
use crate::table::selection::{
    ContextMenuMode, RowClick, RowPredicate, SelectionManager, SelectionMode, SelectionOutcome,
};
use crate::table::sort::{SortEngine, SortEvent, SortMeta, SortOrder};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

fn processed<'a>(value: &'a [DataRow], filtered: Option<&[usize]>) -> Vec<&'a DataRow> {
    match filtered {
        Some(indices) => indices.iter().filter_map(|&i| value.get(i)).collect(),
        None => value.iter().collect(),
    }
}

pub struct DataGrid {
    config: Config,
    value: Vec<DataRow>,
    columns: ColumnLayout,
    sort: SortEngine,
    filter: FilterEngine,
    selection: SelectionManager,
    pagination: PaginationCoordinator,
    edits: EditSessionManager,
    expansion: RowExpansion,
    events: EventChannel,
    persistence: Option<StatePersistence>,
    context_row: Option<DataRow>,
    export_function: Option<ExportFunction>,
    pending_lazy_request: Option<LazyLoadEvent>,
    restoring: bool,
}

impl DataGrid {
    /// Build a grid from configuration. A stateful grid (one with a state
    /// key) uses the platform storage host until another is supplied.
    pub fn new(columns: Vec<ColumnDescriptor>, config: Config) -> Self {
        let data_key = config.table.data_key.clone();

        let mut sort = SortEngine::new(config.sort.mode, config.sort.default_sort_order)
            .with_locale(config.sort.locale.clone());
        if let Some(group) = &config.table.group_rows_by {
            sort = sort.with_group_field(group.clone(), config.table.group_rows_by_order);
        }

        let filter = FilterEngine::new(config.filter.delay_ms)
            .with_global_filter_fields(config.filter.global_filter_fields.clone())
            .with_locale(config.filter.locale.clone())
            .with_default_match_mode(config.filter.default_match_mode.clone());

        let selection = SelectionManager::new(config.selection.mode, data_key.clone())
            .with_meta_key_selection(config.selection.meta_key_selection);

        let persistence = config.state.key.as_ref().map(|key| {
            StatePersistence::new(key.clone(), config.state.storage.clone(), StorageHost::platform())
        });

        Self {
            columns: ColumnLayout::new(columns, config.columns.resize_mode, config.columns.min_width),
            sort,
            filter,
            selection,
            pagination: PaginationCoordinator::new(
                config.table.rows,
                config.table.lazy,
                config.table.paginator,
            ),
            edits: EditSessionManager::new(config.edit.mode, data_key.clone()),
            expansion: RowExpansion::new(
                config.expansion.mode,
                data_key,
                config.table.group_rows_by.clone(),
            ),
            events: EventChannel::new(),
            persistence,
            context_row: None,
            export_function: None,
            pending_lazy_request: None,
            restoring: false,
            value: Vec::new(),
            config,
        }
    }

    /// Replace the storage backends used by a stateful grid
    pub fn with_storage_host(mut self, host: StorageHost) -> Self {
        if let Some(key) = self.config.state.key.clone() {
            self.persistence = Some(StatePersistence::new(
                key,
                self.config.state.storage.clone(),
                host,
            ));
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---- host wiring ----

    pub fn subscribe_fn<F>(&mut self, channel: Channel, name: &str, handler: F) -> SubscriptionId
    where
        F: FnMut(&GridEvent) + 'static,
    {
        self.events.subscribe_fn(channel, name, handler)
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    pub fn filter_service_mut(&mut self) -> &mut FilterService {
        self.filter.service_mut()
    }

    pub fn set_row_selectable(&mut self, predicate: Option<RowPredicate>) {
        self.selection.set_row_selectable(predicate);
    }

    pub fn set_row_editable(&mut self, predicate: Option<RowEditablePredicate>) {
        self.edits.set_row_editable(predicate);
    }

    pub fn set_edit_validator(&mut self, validator: Option<EditValidator>) {
        self.edits.set_validator(validator);
    }

    pub fn set_export_function(&mut self, export_function: Option<ExportFunction>) {
        self.export_function = export_function;
    }

    pub fn bind_select_all(&mut self, state: Option<bool>) {
        self.selection.bind_select_all(state);
    }

    // ---- read access ----

    pub fn value(&self) -> &[DataRow] {
        &self.value
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.columns.columns()
    }

    pub fn column_layout(&self) -> &ColumnLayout {
        &self.columns
    }

    pub fn sort_engine(&self) -> &SortEngine {
        &self.sort
    }

    pub fn filter_engine(&self) -> &FilterEngine {
        &self.filter
    }

    pub fn pagination(&self) -> &PaginationCoordinator {
        &self.pagination
    }

    pub fn selection(&self) -> &[DataRow] {
        self.selection.selection()
    }

    pub fn selection_manager(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn is_selected(&self, row: &DataRow) -> bool {
        self.selection.is_selected(row)
    }

    pub fn context_row(&self) -> Option<&DataRow> {
        self.context_row.as_ref()
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edits.session()
    }

    pub fn is_stateful(&self) -> bool {
        self.persistence.is_some()
    }

    /// Bound-row indices after sorting and filtering
    pub fn processed_indices(&self) -> Vec<usize> {
        match self.filter.filtered_indices() {
            Some(indices) => indices.to_vec(),
            None => (0..self.value.len()).collect(),
        }
    }

    /// Rows after sorting and filtering
    pub fn processed_rows(&self) -> Vec<&DataRow> {
        processed(&self.value, self.filter.filtered_indices())
    }

    /// Rows on the current page
    pub fn visible_rows(&self) -> Vec<&DataRow> {
        let rows = self.processed_rows();
        let range = self.pagination.page_range(rows.len());
        rows[range].to_vec()
    }

    fn processed_row(&self, index: usize) -> Option<DataRow> {
        self.processed_rows().get(index).map(|row| (*row).clone())
    }

    fn bound_index(&self, processed_index: usize) -> Option<usize> {
        match self.filter.filtered_indices() {
            Some(indices) => indices.get(processed_index).copied(),
            None => (processed_index < self.value.len()).then_some(processed_index),
        }
    }

    // ---- bound data ----

    /// Bind new rows. Local mode re-applies the active sort and filter and
    /// resets the total record count to the row count.
    pub fn set_value(&mut self, rows: Vec<DataRow>) -> Result<()> {
        self.value = rows;
        self.edits.reset();
        self.filter.invalidate();

        if !self.pagination.is_lazy() {
            if self.sort.is_active() {
                let event = self.sort_value();
                self.events.publish(GridEvent::SortChanged(event));
            }
            if self.filter.has_filter() {
                self.filter
                    .apply_filters(&self.value, self.columns.columns())?;
                self.filter.finish_restore();
            }
            let total = self.processed_rows().len();
            self.update_total_records(total);
            self.pagination.clamp_to_total();
        }

        debug!("Bound {} rows", self.value.len());
        self.publish_value_changed();
        Ok(())
    }

    /// Deliver rows for a lazy request. Responses to superseded requests
    /// are discarded and reported as `false`.
    pub fn set_lazy_data(&mut self, request_id: u64, rows: Vec<DataRow>, total_records: usize) -> bool {
        if !self.pagination.is_latest(request_id) {
            return false;
        }
        self.value = rows;
        self.edits.reset();
        self.filter.invalidate();
        self.update_total_records(total_records);
        self.publish_value_changed();
        true
    }

    pub fn set_total_records(&mut self, total: usize) {
        self.update_total_records(total);
    }

    fn update_total_records(&mut self, total: usize) {
        if self.pagination.set_total_records(total) {
            self.events.publish(GridEvent::TotalRecordsChanged(total));
        }
    }

    fn publish_value_changed(&mut self) {
        let row_count = self.processed_rows().len();
        self.events.publish(GridEvent::ValueChanged { row_count });
    }

    /// The lazy-load request issued since the last call, if any
    pub fn take_lazy_request(&mut self) -> Option<LazyLoadEvent> {
        self.pending_lazy_request.take()
    }

    fn request_lazy_load(&mut self) {
        let request = self
            .pagination
            .build_lazy_load_request(&self.sort, &self.filter);
        info!("Lazy load #{} requested", request.request_id);
        self.pending_lazy_request = Some(request);
    }

    // ---- sorting ----

    /// Header click on a sortable column
    pub fn sort(&mut self, field: &str, meta_key: bool) -> Result<()> {
        self.sort.click(field, meta_key);
        if self.config.sort.reset_page_on_sort {
            self.pagination.reset_first();
        }
        self.apply_sort()
    }

    pub fn sort_single(&mut self, field: &str, order: SortOrder) -> Result<()> {
        self.sort.set_sort(field, order);
        self.apply_sort()
    }

    pub fn sort_multiple(&mut self, specs: Vec<SortMeta>) -> Result<()> {
        self.sort.set_multi_sort_meta(specs);
        self.apply_sort()
    }

    fn apply_sort(&mut self) -> Result<()> {
        let restored = self.sort.is_restoring();
        if self.pagination.is_lazy() {
            self.request_lazy_load();
            self.sort.finish_restore();
            let event = self.sort.event();
            self.events.publish(GridEvent::SortChanged(event));
        } else {
            let event = self.sort_value();
            // cached indices point at the old order, even when the last
            // constraint was cleared and its recompute is still pending
            self.filter
                .apply_filters(&self.value, self.columns.columns())?;
            self.events.publish(GridEvent::SortChanged(event));
            self.publish_value_changed();
        }
        self.selection.reset_anchor();
        if restored {
            return Ok(());
        }
        self.save_if_stateful()
    }

    /// Sort the bound rows in place, keeping an open edit session on its row
    fn sort_value(&mut self) -> Option<SortEvent> {
        if !self.edits.is_open() {
            return self.sort.apply(&mut self.value);
        }
        let order = self.sort.sorted_indices(&self.value);
        let event = self.sort.apply(&mut self.value);
        self.edits.follow_reorder(&order);
        event
    }

    // ---- filtering ----

    /// Typed filter input: the constraint updates now, the recompute runs
    /// from `poll_filter` once the debounce window has passed.
    pub fn filter(&mut self, field: &str, value: DataValue, match_mode: Option<&str>, now: Instant) {
        self.filter.request_filter(field, value, match_mode, now);
    }

    pub fn filter_global(&mut self, value: DataValue, match_mode: Option<&str>, now: Instant) {
        self.filter.request_filter(GLOBAL_FIELD, value, match_mode, now);
    }

    /// Run a debounced recompute if it is due. Returns whether it ran.
    pub fn poll_filter(&mut self, now: Instant) -> Result<bool> {
        if !self.filter.poll_due(now) {
            return Ok(false);
        }
        self.run_filter()?;
        Ok(true)
    }

    /// Recompute immediately, dropping any pending debounce
    pub fn force_filter(&mut self) -> Result<()> {
        self.filter.cancel_pending();
        self.run_filter()
    }

    /// Menu filter: constraints combined by their operator, applied at once
    pub fn set_filter_constraints(&mut self, field: &str, constraints: Vec<FilterConstraint>) -> Result<()> {
        self.filter.set_constraints(field, constraints);
        self.force_filter()
    }

    fn run_filter(&mut self) -> Result<()> {
        let restored = self.filter.is_restoring();
        if !restored {
            self.pagination.reset_first();
        }

        if self.pagination.is_lazy() {
            self.request_lazy_load();
        } else {
            self.filter
                .apply_filters(&self.value, self.columns.columns())?;
            let total = self.processed_rows().len();
            self.update_total_records(total);
        }
        self.filter.finish_restore();
        self.selection.reset_anchor();
        self.publish_value_changed();

        if restored {
            return Ok(());
        }
        self.save_if_stateful()
    }

    // ---- pagination ----

    pub fn set_page(&mut self, first: usize, rows: usize) -> Result<()> {
        if !self.pagination.set_page(first, rows) {
            return Ok(());
        }
        if self.pagination.is_lazy() {
            self.request_lazy_load();
        }
        self.selection.reset_anchor();
        self.save_if_stateful()
    }

    // ---- selection ----

    fn after_selection(&mut self, outcome: SelectionOutcome) -> Result<SelectionOutcome> {
        if outcome == SelectionOutcome::Changed {
            self.events.publish(GridEvent::SelectionChanged {
                selection: self.selection.selection().to_vec(),
            });
            self.save_if_stateful()?;
        }
        Ok(outcome)
    }

    /// Row click at a processed-row index
    pub fn handle_row_click(&mut self, index: usize, click: RowClick) -> Result<SelectionOutcome> {
        let rows = processed(&self.value, self.filter.filtered_indices());
        let outcome = match rows.get(index) {
            Some(row) => self.selection.handle_row_click(row, index, click, &rows),
            None => SelectionOutcome::Unchanged,
        };
        self.after_selection(outcome)
    }

    /// A touch starts; the following click ignores meta-key semantics
    pub fn handle_row_touch(&mut self) {
        self.selection.touch();
    }

    pub fn select_range(&mut self, anchor_index: usize, target_index: usize) -> Result<SelectionOutcome> {
        let rows = processed(&self.value, self.filter.filtered_indices());
        let outcome = self
            .selection
            .select_range(anchor_index, target_index, &rows);
        self.after_selection(outcome)
    }

    pub fn toggle_row_with_checkbox(&mut self, index: usize) -> Result<SelectionOutcome> {
        let outcome = match self.processed_row(index) {
            Some(row) => self.selection.toggle_with_checkbox(&row, index),
            None => SelectionOutcome::Unchanged,
        };
        self.after_selection(outcome)
    }

    pub fn toggle_row_with_radio(&mut self, index: usize) -> Result<SelectionOutcome> {
        let outcome = match self.processed_row(index) {
            Some(row) => self.selection.toggle_with_radio(&row, index),
            None => SelectionOutcome::Unchanged,
        };
        self.after_selection(outcome)
    }

    /// Header checkbox over the current page or all processed rows
    pub fn toggle_all(&mut self, check: bool) -> Result<SelectionOutcome> {
        let page_only = self.config.selection.page_only;
        let rows = processed(&self.value, self.filter.filtered_indices());
        let (candidates, first_index) = if page_only {
            let range = self.pagination.page_range(rows.len());
            let start = range.start;
            (&rows[range], start)
        } else {
            (&rows[..], 0)
        };
        let outcome = self
            .selection
            .toggle_all(check, candidates, first_index, page_only);
        self.after_selection(outcome)
    }

    /// Whether the header checkbox shows as checked
    pub fn all_selected(&self) -> bool {
        let rows = self.processed_rows();
        if self.config.selection.page_only {
            let range = self.pagination.page_range(rows.len());
            self.selection.all_selected(&rows[range])
        } else {
            self.selection.all_selected(&rows)
        }
    }

    pub fn set_selection(&mut self, rows: Vec<DataRow>) -> Result<SelectionOutcome> {
        self.selection.set_selection(rows);
        self.after_selection(SelectionOutcome::Changed)
    }

    pub fn clear_selection(&mut self) -> Result<SelectionOutcome> {
        let outcome = self.selection.clear();
        self.after_selection(outcome)
    }

    /// Right-click target. In joint mode an unselected row also becomes
    /// the selection.
    pub fn select_context_row(&mut self, index: usize) -> Result<()> {
        let Some(row) = self.processed_row(index) else {
            return Ok(());
        };

        if self.config.selection.context_menu_mode == ContextMenuMode::Joint
            && self.selection.mode() != SelectionMode::None
            && !self.selection.is_selected(&row)
        {
            self.selection.set_selection(vec![row.clone()]);
            self.after_selection(SelectionOutcome::Changed)?;
        }

        self.context_row = Some(row.clone());
        self.events.publish(GridEvent::ContextRowChanged(Some(row)));
        Ok(())
    }

    pub fn clear_context_row(&mut self) {
        if self.context_row.take().is_some() {
            self.events.publish(GridEvent::ContextRowChanged(None));
        }
    }

    // ---- editing ----

    fn editable_fields(&self) -> Vec<String> {
        self.columns
            .columns()
            .iter()
            .filter(|c| c.editable)
            .map(|c| c.field.clone())
            .collect()
    }

    fn after_edit(&mut self, outcome: EditOutcome) -> EditOutcome {
        match &outcome {
            EditOutcome::Committed(_) | EditOutcome::Cancelled(_) => self.publish_value_changed(),
            EditOutcome::Opened {
                committed: Some(_),
            } => self.publish_value_changed(),
            _ => {}
        }
        outcome
    }

    /// Open a cell editor at a processed-row index
    pub fn open_cell(&mut self, index: usize, field: &str) -> EditOutcome {
        let editable = self
            .columns
            .columns()
            .iter()
            .any(|c| c.field == field && c.editable);
        let Some(bound) = self.bound_index(index).filter(|_| editable) else {
            return EditOutcome::Refused;
        };
        let outcome = self.edits.open_cell(&self.value, bound, field);
        self.after_edit(outcome)
    }

    /// Update the value being edited in the open session
    pub fn set_edit_value(&mut self, field: &str, value: DataValue) -> bool {
        self.edits.set_value(&mut self.value, field, value)
    }

    pub fn commit_edit(&mut self) -> EditOutcome {
        let outcome = self.edits.commit();
        self.after_edit(outcome)
    }

    pub fn cancel_edit(&mut self) -> EditOutcome {
        let outcome = self.edits.cancel(&mut self.value);
        self.after_edit(outcome)
    }

    pub fn move_to_next_cell(&mut self) -> EditOutcome {
        let order = self.processed_indices();
        let fields = self.editable_fields();
        let outcome = self.edits.move_to_next_cell(&self.value, &order, &fields);
        self.after_edit(outcome)
    }

    pub fn move_to_previous_cell(&mut self) -> EditOutcome {
        let order = self.processed_indices();
        let fields = self.editable_fields();
        let outcome = self
            .edits
            .move_to_previous_cell(&self.value, &order, &fields);
        self.after_edit(outcome)
    }

    pub fn init_row_edit(&mut self, index: usize) -> Result<EditOutcome> {
        let Some(bound) = self.bound_index(index) else {
            return Ok(EditOutcome::Refused);
        };
        let outcome = self.edits.init_row_edit(&self.value, bound)?;
        Ok(self.after_edit(outcome))
    }

    pub fn save_row_edit(&mut self, index: usize) -> Result<EditOutcome> {
        let Some(bound) = self.bound_index(index) else {
            return Ok(EditOutcome::Idle);
        };
        let outcome = self.edits.save_row_edit(&self.value, bound)?;
        Ok(self.after_edit(outcome))
    }

    pub fn cancel_row_edit(&mut self, index: usize) -> Result<EditOutcome> {
        let Some(bound) = self.bound_index(index) else {
            return Ok(EditOutcome::Idle);
        };
        let outcome = self.edits.cancel_row_edit(&mut self.value, bound)?;
        Ok(self.after_edit(outcome))
    }

    pub fn is_row_editing(&self, row: &DataRow) -> Result<bool> {
        self.edits.is_row_editing(row)
    }

    // ---- row expansion ----

    pub fn toggle_row(&mut self, row: &DataRow) -> Result<bool> {
        let expanded = self.expansion.toggle_row(row)?;
        self.save_if_stateful()?;
        Ok(expanded)
    }

    pub fn is_row_expanded(&self, row: &DataRow) -> Result<bool> {
        self.expansion.is_row_expanded(row)
    }

    // ---- columns ----

    /// Measured widths from the renderer
    pub fn set_column_widths(&mut self, widths: &[u32]) {
        self.columns.set_widths(widths);
    }

    pub fn resize_column(&mut self, index: usize, delta: i32) -> Result<bool> {
        if !self.config.columns.resizable || !self.columns.resize_column(index, delta) {
            return Ok(false);
        }
        self.save_if_stateful()?;
        Ok(true)
    }

    fn after_reorder(&mut self, moved: bool) -> Result<bool> {
        if !moved {
            return Ok(false);
        }
        self.events
            .publish(GridEvent::ColumnsChanged(self.columns.columns().to_vec()));
        self.save_if_stateful()?;
        Ok(true)
    }

    pub fn reorder_column(&mut self, from: usize, to: usize) -> Result<bool> {
        let moved = self.config.columns.reorderable && self.columns.reorder_column(from, to);
        self.after_reorder(moved)
    }

    pub fn move_column_left(&mut self, index: usize) -> Result<bool> {
        let moved = self.config.columns.reorderable && self.columns.move_column_left(index);
        self.after_reorder(moved)
    }

    pub fn move_column_right(&mut self, index: usize) -> Result<bool> {
        let moved = self.config.columns.reorderable && self.columns.move_column_right(index);
        self.after_reorder(moved)
    }

    // ---- export ----

    pub fn export_csv(&self, options: &ExportOptions) -> Result<String> {
        let rows: Vec<&DataRow> = match options.scope {
            ExportScope::Selection => self.selection.selection().iter().collect(),
            ExportScope::AllValues => self.value.iter().collect(),
            ExportScope::Filtered => self.processed_rows(),
        };
        DataExporter::export_csv(
            self.columns.columns(),
            rows,
            options.separator,
            self.export_function.as_ref(),
        )
    }

    /// Export to `<dir>/<export filename>_<timestamp>.csv`
    pub fn export_csv_to_file(&self, dir: &Path, options: &ExportOptions) -> Result<PathBuf> {
        let content = self.export_csv(options)?;
        DataExporter::write_csv_file(dir, &self.config.export.filename, &content)
    }

    // ---- state ----

    /// Snapshot of the features currently in use
    pub fn snapshot(&self) -> PersistedSnapshot {
        let mut snapshot = PersistedSnapshot::default();

        if self.pagination.is_paginated() {
            snapshot.first = Some(self.pagination.first());
            snapshot.rows = Some(self.pagination.rows());
        }
        if let Some(field) = self.sort.sort_field() {
            snapshot.sort_field = Some(field.to_string());
            snapshot.sort_order = Some(self.sort.sort_order());
        }
        if let Some(metas) = self.sort.multi_sort_meta() {
            snapshot.multi_sort_meta = Some(metas.to_vec());
        }
        if self.filter.has_filter() {
            snapshot.filters = Some(self.filter.filters().clone());
        }
        if self.config.columns.resizable {
            // the expand-mode table width is the sum of these
            snapshot.column_widths = Some(self.columns.column_widths());
        }
        if self.config.columns.reorderable {
            snapshot.column_order = Some(self.columns.column_order());
        }
        let selection = self.selection.selection();
        if !selection.is_empty() {
            snapshot.selection = Some(match self.selection.mode() {
                SelectionMode::Single => PersistedSelection::Single(selection[0].clone()),
                _ => PersistedSelection::Multiple(selection.to_vec()),
            });
        }
        if !self.expansion.is_empty() {
            snapshot.expanded_row_keys = Some(self.expansion.expanded_keys());
        }
        snapshot
    }

    /// Persist the current snapshot; a no-op for grids without a state key
    pub fn save_state(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        match self.persistence.as_mut() {
            Some(persistence) => persistence.save(&snapshot),
            None => Ok(()),
        }
    }

    fn save_if_stateful(&mut self) -> Result<()> {
        if self.restoring {
            trace!("Skipping state save while restoring");
            return Ok(());
        }
        self.save_state()
    }

    /// Load the persisted snapshot and re-apply it. Returns false when
    /// nothing was stored. The recompute this triggers is not saved again.
    pub fn restore_state(&mut self) -> Result<bool> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(false);
        };
        let Some(snapshot) = persistence.restore()? else {
            return Ok(false);
        };

        self.restoring = true;
        let result = self.apply_snapshot(snapshot);
        self.restoring = false;
        result.map(|_| true)
    }

    fn apply_snapshot(&mut self, snapshot: PersistedSnapshot) -> Result<()> {
        if self.pagination.is_paginated() {
            let first = snapshot.first.unwrap_or(self.pagination.first());
            let rows = snapshot.rows.unwrap_or(self.pagination.rows());
            self.pagination.set_page(first, rows);
        }

        let sort_restored = snapshot.sort_field.is_some() || snapshot.multi_sort_meta.is_some();
        self.sort
            .restore(snapshot.sort_field, snapshot.sort_order, snapshot.multi_sort_meta);

        let filter_restored = snapshot.filters.is_some();
        if let Some(filters) = snapshot.filters {
            self.filter.restore(filters);
        }

        // widths are stored in display order
        if let Some(order) = &snapshot.column_order {
            self.columns.restore_order(order);
            self.events
                .publish(GridEvent::ColumnsChanged(self.columns.columns().to_vec()));
        }
        if let Some(widths) = &snapshot.column_widths {
            self.columns.restore_widths(widths);
        }
        if let Some(selection) = snapshot.selection {
            self.selection.set_selection(selection.into_rows());
            self.events.publish(GridEvent::SelectionChanged {
                selection: self.selection.selection().to_vec(),
            });
        }
        if let Some(keys) = snapshot.expanded_row_keys {
            self.expansion.restore(keys);
        }

        if self.pagination.is_lazy() {
            if sort_restored || filter_restored {
                self.request_lazy_load();
            }
            self.sort.finish_restore();
            self.filter.finish_restore();
        } else if !self.value.is_empty() {
            if sort_restored {
                self.apply_sort()?;
            }
            if filter_restored {
                self.run_filter()?;
            }
        }
        Ok(())
    }

    pub fn clear_state(&mut self) -> Result<()> {
        match self.persistence.as_mut() {
            Some(persistence) => persistence.clear(),
            None => Ok(()),
        }
    }

    /// Reset sort, filters and page offset in one step
    pub fn clear(&mut self) -> Result<()> {
        self.sort.reset();
        self.filter.clear_values();
        self.pagination.reset_first();
        self.selection.reset_anchor();
        self.events.publish(GridEvent::SortChanged(None));

        if self.pagination.is_lazy() {
            self.request_lazy_load();
        } else {
            let total = self.value.len();
            self.update_total_records(total);
        }
        self.publish_value_changed();
        info!("Grid state cleared");
        self.save_if_stateful()
    }
}
