use crate::table::columns::ResizeMode;
use crate::table::edit::EditMode;
use crate::table::expansion::ExpansionMode;
use crate::table::filter_service::match_modes;
use crate::table::selection::{ContextMenuMode, SelectionMode};
use crate::table::sort::{SortMode, SortOrder};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub table: TableConfig,
    pub sort: SortConfig,
    pub filter: FilterConfig,
    pub selection: SelectionConfig,
    pub edit: EditConfig,
    pub expansion: ExpansionConfig,
    pub columns: ColumnsConfig,
    pub state: StateConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Field path that uniquely identifies a row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,

    /// Sort, filter and page changes are fetched by the host instead of applied locally
    pub lazy: bool,

    pub paginator: bool,

    /// Rows per page
    pub rows: usize,

    /// Keep rows grouped by this field ahead of any other ordering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_rows_by: Option<String>,

    pub group_rows_by_order: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub mode: SortMode,
    pub default_sort_order: SortOrder,
    /// Jump back to the first page after a sort
    pub reset_page_on_sort: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Debounce window for typed filter input
    pub delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Fields searched by the global filter (defaults to all columns)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_filter_fields: Option<Vec<String>>,
    pub default_match_mode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
    pub meta_key_selection: bool,
    /// Select-all covers the current page only
    pub page_only: bool,
    pub context_menu_mode: ContextMenuMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub mode: EditMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub mode: ExpansionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub resizable: bool,
    pub resize_mode: ResizeMode,
    pub reorderable: bool,
    pub min_width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Storage key; the grid is stateful only when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// "session" or "local"
    pub storage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub csv_separator: char,
    pub filename: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            data_key: None,
            lazy: false,
            paginator: false,
            rows: 10,
            group_rows_by: None,
            group_rows_by_order: SortOrder::Ascending,
        }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            mode: SortMode::Single,
            default_sort_order: SortOrder::Ascending,
            reset_page_on_sort: true,
            locale: None,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            locale: None,
            global_filter_fields: None,
            default_match_mode: match_modes::STARTS_WITH.to_string(),
        }
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            resizable: false,
            resize_mode: ResizeMode::Fit,
            reorderable: false,
            min_width: 15,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            key: None,
            storage: "session".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_separator: ',',
            filename: "download".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("grid-state").join("config.toml"))
    }

    pub fn is_stateful(&self) -> bool {
        self.state.key.is_some()
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Grid State Configuration File
# Location: ~/.config/grid-state/config.toml (Linux/macOS)
#           %APPDATA%\grid-state\config.toml (Windows)

[table]
# Field path that uniquely identifies a row, e.g. "id"
# Required for row expansion and row editing
# data_key = "id"

# Let the host fetch rows for every sort/filter/page change
lazy = false
paginator = false
rows = 10

# Keep rows grouped by a field before sorting within the group
# group_rows_by = "category"
group_rows_by_order = 1

[sort]
# "single" or "multiple"
mode = "single"
# 1 = ascending, -1 = descending
default_sort_order = 1
reset_page_on_sort = true
# locale = "tr"

[filter]
# Debounce window for typed filter input, in milliseconds
delay_ms = 300
# Fields searched by the global filter (defaults to every column)
# global_filter_fields = ["name", "country"]
default_match_mode = "startsWith"

[selection]
# "none", "single" or "multiple"
mode = "none"
# Plain clicks replace the selection, meta-key clicks toggle
meta_key_selection = false
# Select-all covers the current page only
page_only = false
# "separate" keeps the context-menu row apart, "joint" selects it too
context_menu_mode = "separate"

[edit]
# "cell" or "row"
mode = "cell"

[expansion]
# "single" collapses other rows on expand
mode = "multiple"

[columns]
resizable = false
# "fit" keeps the table width, "expand" grows it
resize_mode = "fit"
reorderable = false
min_width = 15

[state]
# Setting a key makes the grid stateful
# key = "orders-grid"
# "session" (in memory) or "local" (on disk)
storage = "session"

[export]
csv_separator = ","
filename = "download"
"#
        .to_string()
    }
}
