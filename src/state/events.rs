//! Grid notifications and the channels they travel on

use crate::data::datatable::{ColumnDescriptor, DataRow};
use crate::table::sort::SortEvent;

/// The named channels a subscriber can listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    SortChanged,
    SelectionChanged,
    ContextRowChanged,
    ValueChanged,
    TotalRecordsChanged,
    ColumnsChanged,
}

/// Notifications published by the grid after a state change
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// Sort applied; `None` when sorting was reset
    SortChanged(Option<SortEvent>),

    /// Selection value after the change
    SelectionChanged { selection: Vec<DataRow> },

    /// Row targeted by the context menu
    ContextRowChanged(Option<DataRow>),

    /// Bound or derived rows changed
    ValueChanged { row_count: usize },

    /// Total record count changed
    TotalRecordsChanged(usize),

    /// Column order changed
    ColumnsChanged(Vec<ColumnDescriptor>),
}

impl GridEvent {
    pub fn channel(&self) -> Channel {
        match self {
            GridEvent::SortChanged(_) => Channel::SortChanged,
            GridEvent::SelectionChanged { .. } => Channel::SelectionChanged,
            GridEvent::ContextRowChanged(_) => Channel::ContextRowChanged,
            GridEvent::ValueChanged { .. } => Channel::ValueChanged,
            GridEvent::TotalRecordsChanged(_) => Channel::TotalRecordsChanged,
            GridEvent::ColumnsChanged(_) => Channel::ColumnsChanged,
        }
    }
}
