//! Saving and restoring grid state through a key-value byte store

use crate::data::datatable::DataRow;
use crate::error::{GridError, Result};
use crate::table::filter::FilterMetadata;
use crate::table::sort::{SortMeta, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Persisted selection: one row in single mode, a list in multiple mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedSelection {
    Multiple(Vec<DataRow>),
    Single(DataRow),
}

impl PersistedSelection {
    pub fn into_rows(self) -> Vec<DataRow> {
        match self {
            PersistedSelection::Multiple(rows) => rows,
            PersistedSelection::Single(row) => vec![row],
        }
    }
}

/// Snapshot of the stateful parts of a grid. Keys for inactive features
/// are omitted and left untouched on restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_sort_meta: Option<Vec<SortMeta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, FilterMetadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_widths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<PersistedSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_row_keys: Option<Vec<String>>,
}

impl PersistedSnapshot {
    /// Turn ISO-8601 looking strings back into date values
    pub fn revive_dates(&mut self) {
        if let Some(filters) = self.filters.as_mut() {
            filters.values_mut().for_each(FilterMetadata::revive_dates);
        }
        match self.selection.as_mut() {
            Some(PersistedSelection::Multiple(rows)) => {
                rows.iter_mut().for_each(DataRow::revive_dates)
            }
            Some(PersistedSelection::Single(row)) => row.revive_dates(),
            None => {}
        }
    }
}

/// Which storage backend holds the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Lives as long as the host process
    Session,
    /// Survives restarts
    Local,
}

impl FromStr for StorageKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "session" => Ok(StorageKind::Session),
            "local" => Ok(StorageKind::Local),
            other => Err(GridError::unknown_storage(other)),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Session => write!(f, "session"),
            StorageKind::Local => write!(f, "local"),
        }
    }
}

/// A key-value byte store
pub trait StateStorage {
    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.items.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/grid-state/state`, when the platform has a data directory
    pub fn default_location() -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join("grid-state").join("state")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct keys
    /// never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

impl StateStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// The storage backends a host offers, by kind
#[derive(Default)]
pub struct StorageHost {
    session: Option<Box<dyn StateStorage>>,
    local: Option<Box<dyn StateStorage>>,
}

impl StorageHost {
    /// A host with no storage; every access fails
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory session storage plus file-backed local storage when the
    /// platform has a data directory
    pub fn platform() -> Self {
        let mut host = Self::new().with_session(MemoryStorage::new());
        if let Some(files) = FileStorage::default_location() {
            host = host.with_local(files);
        }
        host
    }

    pub fn with_session(mut self, storage: impl StateStorage + 'static) -> Self {
        self.session = Some(Box::new(storage));
        self
    }

    pub fn with_local(mut self, storage: impl StateStorage + 'static) -> Self {
        self.local = Some(Box::new(storage));
        self
    }

    fn slot(&self, kind: StorageKind) -> Option<&dyn StateStorage> {
        match kind {
            StorageKind::Session => self.session.as_deref(),
            StorageKind::Local => self.local.as_deref(),
        }
    }

    pub fn get(&self, kind: StorageKind) -> Result<&dyn StateStorage> {
        self.slot(kind).ok_or_else(|| {
            GridError::StorageUnavailable(format!("no {kind} storage is available in this host"))
        })
    }

    pub fn get_mut(&mut self, kind: StorageKind) -> Result<&mut dyn StateStorage> {
        let slot = match kind {
            StorageKind::Session => &mut self.session,
            StorageKind::Local => &mut self.local,
        };
        match slot {
            Some(storage) => Ok(storage.as_mut()),
            None => Err(GridError::StorageUnavailable(format!(
                "no {kind} storage is available in this host"
            ))),
        }
    }
}

impl fmt::Debug for StorageHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHost")
            .field("session", &self.session.is_some())
            .field("local", &self.local.is_some())
            .finish()
    }
}

/// Writes snapshots under one key of the configured storage kind.
///
/// The kind is resolved on every access, so a bad identifier surfaces
/// as `StorageUnavailable` from the save/restore call.
#[derive(Debug)]
pub struct StatePersistence {
    key: String,
    storage: String,
    host: StorageHost,
}

impl StatePersistence {
    pub fn new(key: impl Into<String>, storage: impl Into<String>, host: StorageHost) -> Self {
        Self {
            key: key.into(),
            storage: storage.into(),
            host,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&mut self, snapshot: &PersistedSnapshot) -> Result<()> {
        let kind: StorageKind = self.storage.parse()?;
        let bytes = serde_json::to_vec(snapshot)?;
        self.host.get_mut(kind)?.set_item(&self.key, &bytes)?;
        debug!("Saved grid state {} ({} bytes) to {}", self.key, bytes.len(), kind);
        Ok(())
    }

    /// Read the stored snapshot with dates revived; `None` if nothing is stored
    pub fn restore(&self) -> Result<Option<PersistedSnapshot>> {
        let kind: StorageKind = self.storage.parse()?;
        let Some(bytes) = self.host.get(kind)?.get_item(&self.key)? else {
            return Ok(None);
        };
        let mut snapshot: PersistedSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.revive_dates();
        info!("Restored grid state {} from {}", self.key, kind);
        Ok(Some(snapshot))
    }

    pub fn clear(&mut self) -> Result<()> {
        let kind: StorageKind = self.storage.parse()?;
        self.host.get_mut(kind)?.remove_item(&self.key)?;
        info!("Cleared grid state {}", self.key);
        Ok(())
    }
}
