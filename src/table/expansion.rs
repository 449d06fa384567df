//! Expanded row tracking, keyed by the Data Key or the row-group field

use crate::data::datatable::DataRow;
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionMode {
    Single,
    #[default]
    Multiple,
}

#[derive(Debug, Clone, Default)]
pub struct RowExpansion {
    mode: ExpansionMode,
    key_field: Option<String>,
    expanded: BTreeSet<String>,
}

impl RowExpansion {
    /// `group_rows_by` wins over the Data Key when both are set
    pub fn new(mode: ExpansionMode, data_key: Option<String>, group_rows_by: Option<String>) -> Self {
        Self {
            mode,
            key_field: group_rows_by.or(data_key),
            expanded: BTreeSet::new(),
        }
    }

    fn key_of(&self, row: &DataRow) -> Result<String> {
        let field = self
            .key_field
            .as_deref()
            .ok_or_else(|| GridError::data_key_required("row expansion"))?;
        Ok(row.key_for(field).unwrap_or_default())
    }

    /// Flip a row's expanded state; returns whether it is now expanded
    pub fn toggle_row(&mut self, row: &DataRow) -> Result<bool> {
        let key = self.key_of(row)?;
        if self.expanded.remove(&key) {
            debug!("Collapsed row {}", key);
            return Ok(false);
        }
        if self.mode == ExpansionMode::Single {
            self.expanded.clear();
        }
        debug!("Expanded row {}", key);
        self.expanded.insert(key);
        Ok(true)
    }

    pub fn is_row_expanded(&self, row: &DataRow) -> Result<bool> {
        let key = self.key_of(row)?;
        Ok(self.expanded.contains(&key))
    }

    pub fn expanded_keys(&self) -> Vec<String> {
        self.expanded.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn restore(&mut self, keys: Vec<String>) {
        self.expanded = keys.into_iter().collect();
    }
}
