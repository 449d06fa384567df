//! Column order and width layout

use crate::data::datatable::ColumnDescriptor;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_COLUMN_WIDTH: u32 = 100;

/// How a resize distributes the width change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// The neighbour to the right absorbs the change; table width is fixed
    #[default]
    Fit,
    /// The table grows or shrinks with the column
    Expand,
}

#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: Vec<ColumnDescriptor>,
    widths: Vec<u32>,
    resize_mode: ResizeMode,
    min_width: u32,
    resized: bool,
}

impl ColumnLayout {
    pub fn new(columns: Vec<ColumnDescriptor>, resize_mode: ResizeMode, min_width: u32) -> Self {
        let widths = vec![DEFAULT_COLUMN_WIDTH; columns.len()];
        Self {
            columns,
            widths,
            resize_mode,
            min_width,
            resized: false,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Replace the column set; widths reset to the default
    pub fn set_columns(&mut self, columns: Vec<ColumnDescriptor>) {
        self.widths = vec![DEFAULT_COLUMN_WIDTH; columns.len()];
        self.columns = columns;
        self.resized = false;
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    /// Widths measured by the host renderer
    pub fn set_widths(&mut self, widths: &[u32]) {
        for (slot, width) in self.widths.iter_mut().zip(widths) {
            *slot = *width;
        }
    }

    pub fn table_width(&self) -> u32 {
        self.widths.iter().sum()
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resize_mode
    }

    /// Whether a resize has happened since the columns were set
    pub fn is_resized(&self) -> bool {
        self.resized
    }

    /// Change a column width by `delta` pixels. Returns false when the
    /// resize would push a column under the minimum width.
    pub fn resize_column(&mut self, index: usize, delta: i32) -> bool {
        let Some(&width) = self.widths.get(index) else {
            return false;
        };
        let Some(new_width) = width.checked_add_signed(delta).filter(|w| *w >= self.min_width)
        else {
            return false;
        };

        match self.resize_mode {
            ResizeMode::Fit => {
                let Some(&next) = self.widths.get(index + 1) else {
                    return false;
                };
                let Some(next_width) = next
                    .checked_add_signed(-delta)
                    .filter(|w| *w >= self.min_width)
                else {
                    return false;
                };
                self.widths[index + 1] = next_width;
            }
            ResizeMode::Expand => {}
        }

        self.widths[index] = new_width;
        self.resized = true;
        debug!("Column {} resized to {}px", index, new_width);
        true
    }

    /// Move the column at `from` so it lands at `to`
    pub fn reorder_column(&mut self, from: usize, to: usize) -> bool {
        let len = self.columns.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        let width = self.widths.remove(from);
        self.widths.insert(to, width);
        debug!("Column moved {} -> {}", from, to);
        true
    }

    /// Move a column left (swap with previous column).
    /// With wraparound: moving left from the first position moves to the end
    pub fn move_column_left(&mut self, index: usize) -> bool {
        let len = self.columns.len();
        if index >= len {
            return false;
        }
        if index == 0 {
            self.reorder_column(0, len - 1)
        } else {
            self.columns.swap(index - 1, index);
            self.widths.swap(index - 1, index);
            true
        }
    }

    /// Move a column right (swap with next column).
    /// With wraparound: moving right from the last position moves to the start
    pub fn move_column_right(&mut self, index: usize) -> bool {
        let len = self.columns.len();
        if index >= len {
            return false;
        }
        if index == len - 1 {
            self.reorder_column(len - 1, 0)
        } else {
            self.columns.swap(index, index + 1);
            self.widths.swap(index, index + 1);
            true
        }
    }

    /// Comma-joined pixel widths, as persisted
    pub fn column_widths(&self) -> String {
        self.widths
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Apply persisted widths; malformed entries are skipped
    pub fn restore_widths(&mut self, widths: &str) {
        for (slot, part) in self.widths.iter_mut().zip(widths.split(',')) {
            if let Ok(width) = part.trim().parse::<u32>() {
                *slot = width;
            }
        }
        self.resized = true;
    }

    pub fn column_order(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }

    /// Reorder to a persisted field list. Columns the list does not name
    /// keep their relative order after the named ones.
    pub fn restore_order(&mut self, order: &[String]) {
        let mut paired: Vec<(ColumnDescriptor, u32)> = self
            .columns
            .drain(..)
            .zip(self.widths.drain(..))
            .collect();
        let mut reordered = Vec::with_capacity(paired.len());
        for field in order {
            if let Some(pos) = paired.iter().position(|(c, _)| &c.field == field) {
                reordered.push(paired.remove(pos));
            }
        }
        reordered.extend(paired);
        let (columns, widths) = reordered.into_iter().unzip();
        self.columns = columns;
        self.widths = widths;
    }
}
