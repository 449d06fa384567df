use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Matches the ISO 8601 timestamps written by `DataValue::DateTime`.
fn iso_timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-[01]\d-[0-3]\dT[0-2]\d:[0-5]\d:[0-5]\d\.\d+(?:Z|[+-][0-2]\d:[0-5]\d)$")
            .expect("timestamp pattern is valid")
    })
}

/// A single cell value in a row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "JsonValue", from = "JsonValue")]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Array(Vec<DataValue>),
    Object(BTreeMap<String, DataValue>),
    #[default]
    Null,
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Null, whitespace-only strings and empty arrays count as "no value"
    /// when deciding whether a filter constraint is active.
    pub fn is_blank(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::String(s) => s.trim().is_empty(),
            DataValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Integer(i) => Some(*i as f64),
            DataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            DataValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Turn ISO 8601 timestamp strings back into `DateTime` values, recursively.
    ///
    /// Persisted state stores dates as strings; this undoes that on read.
    pub fn revive_dates(&mut self) {
        match self {
            DataValue::String(s) if iso_timestamp_pattern().is_match(s) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                    debug!("Reviving timestamp {}", s);
                    *self = DataValue::DateTime(parsed.with_timezone(&Utc));
                }
            }
            DataValue::Array(items) => items.iter_mut().for_each(DataValue::revive_dates),
            DataValue::Object(map) => map.values_mut().for_each(DataValue::revive_dates),
            _ => {}
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            DataValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            DataValue::Object(_) => write!(f, "{}", JsonValue::from(self.clone())),
            DataValue::Null => write!(f, ""),
        }
    }
}

impl From<DataValue> for JsonValue {
    fn from(value: DataValue) -> Self {
        match value {
            DataValue::String(s) => JsonValue::String(s),
            DataValue::Integer(i) => JsonValue::from(i),
            DataValue::Float(f) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DataValue::Boolean(b) => JsonValue::Bool(b),
            DataValue::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            DataValue::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            DataValue::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect::<Map<String, JsonValue>>(),
            ),
            DataValue::Null => JsonValue::Null,
        }
    }
}

impl From<JsonValue> for DataValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => DataValue::Null,
            JsonValue::Bool(b) => DataValue::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Integer(i),
                None => DataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => DataValue::String(s),
            JsonValue::Array(items) => {
                DataValue::Array(items.into_iter().map(DataValue::from).collect())
            }
            JsonValue::Object(map) => DataValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, DataValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Integer(i)
    }
}

impl From<i32> for DataValue {
    fn from(i: i32) -> Self {
        DataValue::Integer(i64::from(i))
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(dt: DateTime<Utc>) -> Self {
        DataValue::DateTime(dt)
    }
}

/// A record of application data, addressed by field name.
///
/// Nested objects are reachable with dotted field paths (`address.city`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow {
    fields: BTreeMap<String, DataValue>,
}

impl DataRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&DataValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, DataValue> {
        &self.fields
    }

    /// Resolve a dotted field path. Missing segments resolve to `None`.
    pub fn resolve(&self, path: &str) -> Option<&DataValue> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            match current {
                DataValue::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Write a value at a dotted field path, creating intermediate objects.
    pub fn set_path(&mut self, path: &str, value: DataValue) {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };

        let mut map = &mut self.fields;
        for segment in parents {
            let entry = map
                .entry((*segment).to_string())
                .or_insert_with(|| DataValue::Object(BTreeMap::new()));
            if !matches!(entry, DataValue::Object(_)) {
                *entry = DataValue::Object(BTreeMap::new());
            }
            map = match entry {
                DataValue::Object(inner) => inner,
                _ => return,
            };
        }
        map.insert((*last).to_string(), value);
    }

    /// Resolve the Data Key value of this row as a string key.
    pub fn key_for(&self, data_key: &str) -> Option<String> {
        self.resolve(data_key)
            .filter(|value| !value.is_null())
            .map(|value| value.to_string())
    }

    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, DataValue::from(v)))
                    .collect(),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(DataValue::Object(self.fields.clone()))
    }

    pub fn revive_dates(&mut self) {
        self.fields.values_mut().for_each(DataValue::revive_dates);
    }
}

impl From<DataRow> for DataValue {
    fn from(row: DataRow) -> Self {
        DataValue::Object(row.fields)
    }
}

impl From<BTreeMap<String, DataValue>> for DataRow {
    fn from(fields: BTreeMap<String, DataValue>) -> Self {
        Self { fields }
    }
}

/// Parse a JSON array of objects into rows; non-object entries are skipped.
pub fn load_rows_from_json_str(json: &str) -> serde_json::Result<Vec<DataRow>> {
    let value: JsonValue = serde_json::from_str(json)?;
    let rows = match value {
        JsonValue::Array(items) => items.into_iter().filter_map(DataRow::from_json).collect(),
        other => DataRow::from_json(other).into_iter().collect(),
    };
    Ok(rows)
}

/// Column metadata: field path plus display and export flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default = "default_true")]
    pub exportable: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnDescriptor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            header: None,
            exportable: true,
            editable: true,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_exportable(mut self, exportable: bool) -> Self {
        self.exportable = exportable;
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Header text, falling back to the field path
    pub fn display_label(&self) -> &str {
        self.header.as_deref().unwrap_or(&self.field)
    }
}
