//! Inline cell and row edit sessions
//!
//! A session moves Closed -> Open -> (Committed | Cancelled) -> Closed and
//! at most one is open at a time. Row indices refer to the bound rows and
//! follow them through reordering (`follow_reorder`).

use crate::data::datatable::{DataRow, DataValue};
use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Cell,
    Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Cell,
    Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub target: EditTarget,
    pub row_index: usize,
    /// Edited field; `None` for row sessions
    pub field: Option<String>,
    pub original_value: DataValue,
    pub current_value: DataValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// A session is now open; `committed` is the one closed to make room
    Opened { committed: Option<Box<EditSession>> },
    Committed(EditSession),
    Cancelled(EditSession),
    /// The open session failed validation, or the target may not be edited
    Refused,
    /// No session was open
    Idle,
}

/// `(session) -> valid`, asked before the open session may close by commit
pub type EditValidator = Box<dyn Fn(&EditSession) -> bool>;

/// `(row, index) -> editable`
pub type RowEditablePredicate = Box<dyn Fn(&DataRow, usize) -> bool>;

pub struct EditSessionManager {
    mode: EditMode,
    data_key: Option<String>,
    session: Option<EditSession>,
    editing_row_keys: HashSet<String>,
    validator: Option<EditValidator>,
    row_editable: Option<RowEditablePredicate>,
}

impl EditSessionManager {
    pub fn new(mode: EditMode, data_key: Option<String>) -> Self {
        Self {
            mode,
            data_key,
            session: None,
            editing_row_keys: HashSet::new(),
            validator: None,
            row_editable: None,
        }
    }

    pub fn set_validator(&mut self, validator: Option<EditValidator>) {
        self.validator = validator;
    }

    pub fn set_row_editable(&mut self, predicate: Option<RowEditablePredicate>) {
        self.row_editable = predicate;
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_editing_cell(&self, row_index: usize, field: &str) -> bool {
        matches!(
            &self.session,
            Some(s) if s.target == EditTarget::Cell
                && s.row_index == row_index
                && s.field.as_deref() == Some(field)
        )
    }

    fn is_valid(&self) -> bool {
        match (&self.session, &self.validator) {
            (Some(session), Some(validator)) => validator(session),
            _ => true,
        }
    }

    fn is_row_editable(&self, row: &DataRow, index: usize) -> bool {
        self.row_editable
            .as_ref()
            .map(|predicate| predicate(row, index))
            .unwrap_or(true)
    }

    fn require_key(&self, row: &DataRow, operation: &str) -> Result<String> {
        let data_key = self
            .data_key
            .as_deref()
            .ok_or_else(|| GridError::data_key_required(operation))?;
        // rows without a key value share the empty key
        Ok(row.key_for(data_key).unwrap_or_default())
    }

    /// Close the open session as committed, unless it is invalid
    fn close_for_open(&mut self) -> std::result::Result<Option<Box<EditSession>>, ()> {
        if self.session.is_none() {
            return Ok(None);
        }
        if !self.is_valid() {
            debug!("Open edit session is invalid, refusing to move");
            return Err(());
        }
        Ok(self.take_committed().map(Box::new))
    }

    fn take_committed(&mut self) -> Option<EditSession> {
        let session = self.session.take()?;
        if session.target == EditTarget::Row {
            self.editing_row_keys.clear();
        }
        Some(session)
    }

    /// Open a cell editor, committing the previous session first
    pub fn open_cell(&mut self, rows: &[DataRow], row_index: usize, field: &str) -> EditOutcome {
        let Some(row) = rows.get(row_index) else {
            return EditOutcome::Refused;
        };
        if self.is_editing_cell(row_index, field) {
            return EditOutcome::Opened { committed: None };
        }
        if !self.is_row_editable(row, row_index) {
            return EditOutcome::Refused;
        }
        let Ok(committed) = self.close_for_open() else {
            return EditOutcome::Refused;
        };

        let original = row.resolve(field).cloned().unwrap_or_default();
        debug!("Editing cell {}:{}", row_index, field);
        self.session = Some(EditSession {
            target: EditTarget::Cell,
            row_index,
            field: Some(field.to_string()),
            original_value: original.clone(),
            current_value: original,
        });
        EditOutcome::Opened { committed }
    }

    /// Write a new value through the open session into its row
    pub fn set_value(&mut self, rows: &mut [DataRow], field: &str, value: DataValue) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.target == EditTarget::Cell && session.field.as_deref() != Some(field) {
            return false;
        }
        let Some(row) = rows.get_mut(session.row_index) else {
            return false;
        };
        row.set_path(field, value.clone());
        session.current_value = match session.target {
            EditTarget::Cell => value,
            EditTarget::Row => DataValue::from(row.clone()),
        };
        true
    }

    /// Point the open session at its row's new position after the bound
    /// rows were reordered. `order[new] == old`.
    pub fn follow_reorder(&mut self, order: &[usize]) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(position) = order.iter().position(|&old| old == session.row_index) {
            debug!("Edit session row {} moved to {}", session.row_index, position);
            session.row_index = position;
        }
    }

    pub fn commit(&mut self) -> EditOutcome {
        if self.session.is_none() {
            return EditOutcome::Idle;
        }
        if !self.is_valid() {
            return EditOutcome::Refused;
        }
        match self.take_committed() {
            Some(session) => {
                debug!("Edit session on row {} committed", session.row_index);
                EditOutcome::Committed(session)
            }
            None => EditOutcome::Idle,
        }
    }

    /// Close without keeping the edit. Cell sessions write the original
    /// value back into the row.
    pub fn cancel(&mut self, rows: &mut [DataRow]) -> EditOutcome {
        let Some(session) = self.session.take() else {
            return EditOutcome::Idle;
        };
        match session.target {
            EditTarget::Cell => {
                if let (Some(field), Some(row)) =
                    (session.field.as_deref(), rows.get_mut(session.row_index))
                {
                    row.set_path(field, session.original_value.clone());
                }
            }
            EditTarget::Row => self.editing_row_keys.clear(),
        }
        debug!("Edit session on row {} cancelled", session.row_index);
        EditOutcome::Cancelled(session)
    }

    /// Commit the open cell and open the next editable one. `order` lists
    /// bound-row indices in display order, `fields` the editable fields.
    pub fn move_to_next_cell(
        &mut self,
        rows: &[DataRow],
        order: &[usize],
        fields: &[String],
    ) -> EditOutcome {
        self.move_cell(rows, order, fields, true)
    }

    pub fn move_to_previous_cell(
        &mut self,
        rows: &[DataRow],
        order: &[usize],
        fields: &[String],
    ) -> EditOutcome {
        self.move_cell(rows, order, fields, false)
    }

    fn move_cell(
        &mut self,
        rows: &[DataRow],
        order: &[usize],
        fields: &[String],
        forward: bool,
    ) -> EditOutcome {
        let Some(session) = self.session.as_ref() else {
            return EditOutcome::Idle;
        };
        if session.target != EditTarget::Cell {
            return EditOutcome::Refused;
        }
        let Some(field) = session.field.as_deref() else {
            return EditOutcome::Refused;
        };
        let (Some(row_pos), Some(field_pos)) = (
            order.iter().position(|&i| i == session.row_index),
            fields.iter().position(|f| f == field),
        ) else {
            return self.commit();
        };

        let cells = order.len() * fields.len();
        let mut cell = row_pos * fields.len() + field_pos;
        loop {
            let next = if forward {
                cell.checked_add(1).filter(|&c| c < cells)
            } else {
                cell.checked_sub(1)
            };
            let Some(next) = next else {
                // boundary: nothing adjacent, just commit
                return self.commit();
            };
            cell = next;
            let row_index = order[cell / fields.len()];
            let row_ok = rows
                .get(row_index)
                .is_some_and(|row| self.is_row_editable(row, row_index));
            if row_ok {
                return self.open_cell(rows, row_index, &fields[cell % fields.len()]);
            }
        }
    }

    /// Start editing a whole row, identified by its Data Key
    pub fn init_row_edit(&mut self, rows: &[DataRow], row_index: usize) -> Result<EditOutcome> {
        let Some(row) = rows.get(row_index) else {
            return Ok(EditOutcome::Refused);
        };
        let key = self.require_key(row, "row editing")?;
        if !self.is_row_editable(row, row_index) {
            return Ok(EditOutcome::Refused);
        }
        let Ok(committed) = self.close_for_open() else {
            return Ok(EditOutcome::Refused);
        };

        debug!("Row {} ({}) entering edit", row_index, key);
        self.editing_row_keys.insert(key);
        let original = DataValue::from(row.clone());
        self.session = Some(EditSession {
            target: EditTarget::Row,
            row_index,
            field: None,
            original_value: original.clone(),
            current_value: original,
        });
        Ok(EditOutcome::Opened { committed })
    }

    pub fn save_row_edit(&mut self, rows: &[DataRow], row_index: usize) -> Result<EditOutcome> {
        let Some(row) = rows.get(row_index) else {
            return Ok(EditOutcome::Idle);
        };
        let key = self.require_key(row, "row editing")?;
        if !self.editing_row_keys.contains(&key) {
            return Ok(EditOutcome::Idle);
        }
        Ok(self.commit())
    }

    pub fn cancel_row_edit(&mut self, rows: &mut [DataRow], row_index: usize) -> Result<EditOutcome> {
        let Some(row) = rows.get(row_index) else {
            return Ok(EditOutcome::Idle);
        };
        let key = self.require_key(row, "row editing")?;
        if !self.editing_row_keys.contains(&key) {
            return Ok(EditOutcome::Idle);
        }
        Ok(self.cancel(rows))
    }

    pub fn is_row_editing(&self, row: &DataRow) -> Result<bool> {
        let key = self.require_key(row, "row editing")?;
        Ok(self.editing_row_keys.contains(&key))
    }

    /// Drop the open session without side effects (bound data replaced)
    pub fn reset(&mut self) {
        self.session = None;
        self.editing_row_keys.clear();
    }
}

impl fmt::Debug for EditSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSessionManager")
            .field("mode", &self.mode)
            .field("session", &self.session)
            .field("editing_row_keys", &self.editing_row_keys)
            .finish()
    }
}
