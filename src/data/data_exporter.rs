use crate::data::datatable::{ColumnDescriptor, DataRow, DataValue};
use crate::error::{GridError, Result};
use chrono::Local;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which rows an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportScope {
    /// The processed (sorted, filtered) rows
    #[default]
    Filtered,
    /// Only the selected rows
    Selection,
    /// Every bound row, ignoring filters
    AllValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub scope: ExportScope,
    pub separator: char,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scope: ExportScope::Filtered,
            separator: ',',
        }
    }
}

impl ExportOptions {
    pub fn with_scope(mut self, scope: ExportScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

/// Host hook formatting a cell for export: `(value, field) -> text`
pub type ExportFunction = Box<dyn Fn(Option<&DataValue>, &str) -> String>;

/// Handles exporting grid rows to CSV
pub struct DataExporter;

impl DataExporter {
    /// Render rows as CSV text. Every field is double-quoted, rows are
    /// joined by `\n` and there is no trailing newline.
    pub fn export_csv<'a>(
        columns: &[ColumnDescriptor],
        rows: impl IntoIterator<Item = &'a DataRow>,
        separator: char,
        export_function: Option<&ExportFunction>,
    ) -> Result<String> {
        if !separator.is_ascii() {
            return Err(GridError::Configuration(format!(
                "csv separator must be a single ASCII character, got {separator:?}"
            )));
        }

        let exportable: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.exportable).collect();
        let mut writer = WriterBuilder::new()
            .delimiter(separator as u8)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(exportable.iter().map(|c| c.display_label()))?;

        let mut count = 0usize;
        for row in rows {
            writer.write_record(
                exportable
                    .iter()
                    .map(|c| Self::format_cell(row, &c.field, export_function)),
            )?;
            count += 1;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| GridError::Io(e.into_error()))?;
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }

        info!("Exported {} rows as CSV", count);
        Ok(text)
    }

    fn format_cell(row: &DataRow, field: &str, export_function: Option<&ExportFunction>) -> String {
        let value = row.resolve(field);
        match export_function {
            Some(format) => format(value, field),
            None => value.map(DataValue::to_string).unwrap_or_default(),
        }
    }

    /// Write CSV text to `<dir>/<prefix>_<timestamp>.csv`
    pub fn write_csv_file(dir: &Path, prefix: &str, content: &str) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{prefix}_{timestamp}.csv"));
        fs::create_dir_all(dir)?;
        fs::write(&path, content)?;
        info!("Exported CSV file: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id").with_header("Id"),
            ColumnDescriptor::new("name").with_header("Name"),
            ColumnDescriptor::new("secret").with_exportable(false),
        ]
    }

    #[test]
    fn test_quotes_and_escaping() {
        let rows = vec![
            DataRow::new().with("id", 1).with("name", "say \"hi\"").with("secret", "x"),
            DataRow::new().with("id", 2),
        ];
        let csv = DataExporter::export_csv(&columns(), &rows, ',', None).unwrap();
        assert_eq!(
            csv,
            "\"Id\",\"Name\"\n\"1\",\"say \"\"hi\"\"\"\n\"2\",\"\""
        );
    }

    #[test]
    fn test_custom_separator_and_function() {
        let rows = vec![DataRow::new().with("id", 1).with("name", "a")];
        let upper: ExportFunction = Box::new(|value: Option<&DataValue>, _field: &str| {
            value.map(|v| v.to_string().to_uppercase()).unwrap_or_default()
        });
        let csv = DataExporter::export_csv(&columns(), &rows, ';', Some(&upper)).unwrap();
        assert_eq!(csv, "\"Id\";\"Name\"\n\"1\";\"A\"");
    }

    #[test]
    fn test_non_ascii_separator_rejected() {
        let rows: Vec<DataRow> = Vec::new();
        assert!(DataExporter::export_csv(&columns(), &rows, '§', None).is_err());
    }

    #[test]
    fn test_write_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = DataExporter::write_csv_file(dir.path(), "download", "\"a\"").unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("download_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "\"a\"");
    }
}
