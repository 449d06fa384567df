//! Per-field and global row filtering

use crate::data::datatable::{ColumnDescriptor, DataRow, DataValue};
use crate::debouncer::Debouncer;
use crate::error::{GridError, Result};
use crate::table::filter_service::{match_modes, FilterService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Reserved filter field applied across the global field list
pub const GLOBAL_FIELD: &str = "global";

/// How multiple constraints on one field combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConstraint {
    #[serde(default)]
    pub value: DataValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
}

impl FilterConstraint {
    pub fn new(value: impl Into<DataValue>, match_mode: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            match_mode: Some(match_mode.into()),
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: FilterOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.value.is_blank()
    }
}

/// A field owns one constraint (inline row filter) or an ordered list
/// combined by an operator (menu filter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterMetadata {
    Menu(Vec<FilterConstraint>),
    Single(FilterConstraint),
}

impl FilterMetadata {
    pub fn is_blank(&self) -> bool {
        match self {
            FilterMetadata::Single(constraint) => constraint.is_blank(),
            FilterMetadata::Menu(constraints) => constraints.iter().all(FilterConstraint::is_blank),
        }
    }

    fn clear_values(&mut self) {
        match self {
            FilterMetadata::Single(constraint) => constraint.value = DataValue::Null,
            FilterMetadata::Menu(constraints) => constraints
                .iter_mut()
                .for_each(|c| c.value = DataValue::Null),
        }
    }

    pub(crate) fn revive_dates(&mut self) {
        match self {
            FilterMetadata::Single(constraint) => constraint.value.revive_dates(),
            FilterMetadata::Menu(constraints) => constraints
                .iter_mut()
                .for_each(|c| c.value.revive_dates()),
        }
    }
}

/// Holds filter constraints and the cached filtered row indices.
#[derive(Debug)]
pub struct FilterEngine {
    filters: BTreeMap<String, FilterMetadata>,
    /// Indices into the source rows; `None` when nothing is filtered out
    filtered: Option<Vec<usize>>,
    service: FilterService,
    global_filter_fields: Option<Vec<String>>,
    default_match_mode: String,
    locale: Option<String>,
    restoring: bool,
    debouncer: Debouncer,
}

impl FilterEngine {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            filters: BTreeMap::new(),
            filtered: None,
            service: FilterService::new(),
            global_filter_fields: None,
            default_match_mode: match_modes::STARTS_WITH.to_string(),
            locale: None,
            restoring: false,
            debouncer: Debouncer::new(delay_ms),
        }
    }

    pub fn with_global_filter_fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.global_filter_fields = fields;
        self
    }

    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_default_match_mode(mut self, match_mode: impl Into<String>) -> Self {
        self.default_match_mode = match_mode.into();
        self
    }

    pub fn service_mut(&mut self) -> &mut FilterService {
        &mut self.service
    }

    pub fn filters(&self) -> &BTreeMap<String, FilterMetadata> {
        &self.filters
    }

    /// Filters with blank entries removed, as handed to a lazy data source
    pub fn active_filters(&self) -> BTreeMap<String, FilterMetadata> {
        self.filters
            .iter()
            .filter(|(_, meta)| !meta.is_blank())
            .map(|(field, meta)| (field.clone(), meta.clone()))
            .collect()
    }

    pub fn global_filter_value(&self) -> Option<&DataValue> {
        match self.filters.get(GLOBAL_FIELD) {
            Some(FilterMetadata::Single(constraint)) if !constraint.is_blank() => {
                Some(&constraint.value)
            }
            _ => None,
        }
    }

    /// Set an inline constraint; a blank value removes the field's filter.
    pub fn set_constraint(
        &mut self,
        field: &str,
        value: DataValue,
        match_mode: Option<&str>,
    ) {
        if value.is_blank() {
            self.filters.remove(field);
        } else {
            let match_mode = match_mode.unwrap_or(&self.default_match_mode).to_string();
            self.filters.insert(
                field.to_string(),
                FilterMetadata::Single(FilterConstraint {
                    value,
                    match_mode: Some(match_mode),
                    operator: None,
                }),
            );
        }
    }

    /// Set the menu constraints of a field
    pub fn set_constraints(&mut self, field: &str, constraints: Vec<FilterConstraint>) {
        if constraints.is_empty() {
            self.filters.remove(field);
        } else {
            self.filters
                .insert(field.to_string(), FilterMetadata::Menu(constraints));
        }
    }

    /// Update a constraint now and schedule the recompute after the delay.
    /// A later request within the window supersedes this one.
    pub fn request_filter(
        &mut self,
        field: &str,
        value: DataValue,
        match_mode: Option<&str>,
        now: Instant,
    ) {
        self.set_constraint(field, value, match_mode);
        self.debouncer.trigger_at(now);
        debug!("Filter on {} scheduled", field);
    }

    /// True once when the scheduled recompute is due
    pub fn poll_due(&mut self, now: Instant) -> bool {
        self.debouncer.should_execute_at(now)
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn cancel_pending(&mut self) {
        self.debouncer.reset();
    }

    /// Whether any non-blank constraint exists
    pub fn has_filter(&self) -> bool {
        self.filters.values().any(|meta| !meta.is_blank())
    }

    pub fn filtered_indices(&self) -> Option<&[usize]> {
        self.filtered.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.filtered = None;
    }

    /// Blank every constraint value, keeping menu structure
    pub fn clear_values(&mut self) {
        self.filters.values_mut().for_each(FilterMetadata::clear_values);
        self.filtered = None;
        self.debouncer.reset();
    }

    /// Re-hydrate persisted filters; the next recompute is flagged as a restore.
    pub fn restore(&mut self, mut filters: BTreeMap<String, FilterMetadata>) {
        filters.values_mut().for_each(FilterMetadata::revive_dates);
        self.filters = filters;
        self.restoring = true;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn finish_restore(&mut self) {
        self.restoring = false;
    }

    fn global_fields(&self, columns: &[ColumnDescriptor]) -> Result<Vec<String>> {
        match &self.global_filter_fields {
            Some(fields) => Ok(fields.clone()),
            None if !columns.is_empty() => Ok(columns.iter().map(|c| c.field.clone()).collect()),
            None => Err(GridError::global_filter_fields_required()),
        }
    }

    fn evaluate(&self, row: &DataRow, field: &str, constraint: &FilterConstraint) -> bool {
        let match_mode = constraint
            .match_mode
            .as_deref()
            .unwrap_or(&self.default_match_mode);
        self.service.evaluate(
            match_mode,
            row.resolve(field),
            &constraint.value,
            self.locale.as_deref(),
        )
    }

    fn field_matches(&self, row: &DataRow, field: &str, meta: &FilterMetadata) -> bool {
        match meta {
            FilterMetadata::Single(constraint) => self.evaluate(row, field, constraint),
            FilterMetadata::Menu(constraints) => {
                let operator = constraints
                    .first()
                    .and_then(|c| c.operator)
                    .unwrap_or(FilterOperator::And);
                let mut active = constraints.iter().filter(|c| !c.is_blank());
                match operator {
                    FilterOperator::And => active.all(|c| self.evaluate(row, field, c)),
                    FilterOperator::Or => active.any(|c| self.evaluate(row, field, c)),
                }
            }
        }
    }

    /// Whether one row passes the local constraints and the global filter
    pub fn matches(&self, row: &DataRow, global_fields: &[String]) -> bool {
        let mut local_filtered = false;
        for (field, meta) in &self.filters {
            if field == GLOBAL_FIELD || meta.is_blank() {
                continue;
            }
            local_filtered = true;
            if !self.field_matches(row, field, meta) {
                return false;
            }
        }

        match self.filters.get(GLOBAL_FIELD) {
            Some(FilterMetadata::Single(global)) if !global.is_blank() => global_fields
                .iter()
                .any(|field| self.evaluate(row, field, global)),
            _ => local_filtered,
        }
    }

    /// Recompute the filtered indices over `rows`.
    ///
    /// The cache is dropped when nothing is filtered or every row passes.
    pub fn apply_filters(&mut self, rows: &[DataRow], columns: &[ColumnDescriptor]) -> Result<()> {
        if !self.has_filter() {
            self.filtered = None;
            return Ok(());
        }

        let global_fields = if self.global_filter_value().is_some() {
            self.global_fields(columns)?
        } else {
            Vec::new()
        };

        let filtered: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row, &global_fields))
            .map(|(idx, _)| idx)
            .collect();

        info!("Filter kept {} of {} rows", filtered.len(), rows.len());
        self.filtered = if filtered.len() == rows.len() {
            None
        } else {
            Some(filtered)
        };
        Ok(())
    }
}
