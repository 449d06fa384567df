use grid_state::config::config::Config;
use grid_state::data::datatable::{ColumnDescriptor, DataRow, DataValue};
use grid_state::table::filter_service::match_modes::{CONTAINS, DATE_AFTER};
use grid_state::table::persistence::{FileStorage, MemoryStorage, StateStorage, StorageHost};
use grid_state::table::selection::{RowClick, SelectionMode};
use grid_state::table::sort::SortOrder;
use grid_state::{DataGrid, GridError, Result};
use chrono::{TimeZone, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tempfile::TempDir;

/// Session storage that counts writes, shared with the test
#[derive(Clone, Default)]
struct CountingStorage {
    inner: Rc<RefCell<MemoryStorage>>,
    writes: Rc<RefCell<usize>>,
}

impl StateStorage for CountingStorage {
    fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.borrow().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        self.inner.borrow_mut().set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.inner.borrow_mut().remove_item(key)
    }
}

fn columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id"),
        ColumnDescriptor::new("name"),
        ColumnDescriptor::new("joined"),
    ]
}

fn rows() -> Vec<DataRow> {
    (1..=6)
        .map(|i| {
            DataRow::new()
                .with("id", i)
                .with("name", format!("user{}", 7 - i))
                .with("joined", Utc.with_ymd_and_hms(2024, 1, i as u32, 0, 0, 0).unwrap())
        })
        .collect()
}

fn stateful_config(storage: &str) -> Config {
    let mut config = Config::default();
    config.table.data_key = Some("id".to_string());
    config.table.paginator = true;
    config.table.rows = 2;
    config.selection.mode = SelectionMode::Multiple;
    config.columns.resizable = true;
    config.columns.reorderable = true;
    config.state.key = Some("people-grid".to_string());
    config.state.storage = storage.to_string();
    config
}

fn configure(grid: &mut DataGrid) {
    let now = Instant::now();
    grid.sort_single("name", SortOrder::Descending).unwrap();
    grid.filter(
        "joined",
        DataValue::from(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
        Some(DATE_AFTER),
        now,
    );
    grid.force_filter().unwrap();
    grid.set_page(2, 2).unwrap();
    grid.handle_row_click(2, RowClick::plain()).unwrap();
    grid.reorder_column(2, 0).unwrap();
    grid.resize_column(0, 20).unwrap();
    grid.toggle_row(&rows()[0]).unwrap();
}

#[test]
fn test_round_trip_through_file_storage() {
    let dir = TempDir::new().unwrap();

    let mut original = DataGrid::new(columns(), stateful_config("local"))
        .with_storage_host(StorageHost::new().with_local(FileStorage::new(dir.path())));
    original.set_value(rows()).unwrap();
    configure(&mut original);

    let mut restored = DataGrid::new(columns(), stateful_config("local"))
        .with_storage_host(StorageHost::new().with_local(FileStorage::new(dir.path())));
    restored.set_value(rows()).unwrap();
    assert!(restored.restore_state().unwrap());

    assert_eq!(restored.snapshot(), original.snapshot());
    assert_eq!(restored.sort_engine().sort_field(), Some("name"));
    assert_eq!(restored.sort_engine().sort_order(), SortOrder::Descending);
    assert_eq!(restored.pagination().first(), 2);
    assert_eq!(restored.selection(), original.selection());
    assert_eq!(
        restored
            .processed_rows()
            .iter()
            .filter_map(|r| r.key_for("id"))
            .collect::<Vec<_>>(),
        original
            .processed_rows()
            .iter()
            .filter_map(|r| r.key_for("id"))
            .collect::<Vec<_>>()
    );
    assert!(restored.is_row_expanded(&rows()[0]).unwrap());
    assert_eq!(
        restored.column_layout().column_order(),
        vec!["joined", "id", "name"]
    );
}

#[test]
fn test_restored_filter_values_are_dates() {
    let storage = CountingStorage::default();
    let mut grid = DataGrid::new(columns(), stateful_config("session"))
        .with_storage_host(StorageHost::new().with_session(storage.clone()));
    grid.set_value(rows()).unwrap();
    configure(&mut grid);

    let mut fresh = DataGrid::new(columns(), stateful_config("session"))
        .with_storage_host(StorageHost::new().with_session(storage));
    fresh.restore_state().unwrap();
    let json = serde_json::to_value(fresh.filter_engine().filters()).unwrap();
    assert_eq!(json["joined"]["value"], "2024-01-02T00:00:00.000Z");
    assert_eq!(json["joined"]["matchMode"], "dateAfter");

    fresh.set_value(rows()).unwrap();
    assert_eq!(fresh.processed_rows().len(), 4);
}

#[test]
fn test_restore_does_not_save_again() {
    let storage = CountingStorage::default();
    let writes = storage.writes.clone();

    let mut grid = DataGrid::new(columns(), stateful_config("session"))
        .with_storage_host(StorageHost::new().with_session(storage.clone()));
    grid.set_value(rows()).unwrap();
    grid.sort_single("name", SortOrder::Ascending).unwrap();
    grid.filter("name", DataValue::from("user"), Some(CONTAINS), Instant::now());
    grid.force_filter().unwrap();
    let after_setup = *writes.borrow();
    assert_eq!(after_setup, 2);

    let mut fresh = DataGrid::new(columns(), stateful_config("session"))
        .with_storage_host(StorageHost::new().with_session(storage));
    fresh.set_value(rows()).unwrap();
    assert!(fresh.restore_state().unwrap());
    assert_eq!(*writes.borrow(), after_setup);

    // the next user action saves normally
    fresh.set_page(2, 2).unwrap();
    assert_eq!(*writes.borrow(), after_setup + 1);
}

#[test]
fn test_clear_state_removes_entry() {
    let storage = CountingStorage::default();
    let mut grid = DataGrid::new(columns(), stateful_config("session"))
        .with_storage_host(StorageHost::new().with_session(storage.clone()));
    grid.set_value(rows()).unwrap();
    grid.sort_single("id", SortOrder::Descending).unwrap();
    assert!(storage.get_item("people-grid").unwrap().is_some());

    grid.clear_state().unwrap();
    assert!(storage.get_item("people-grid").unwrap().is_none());
    assert!(!grid.restore_state().unwrap());
}

#[test]
fn test_unknown_storage_kind_fails_on_save() {
    let mut grid = DataGrid::new(columns(), stateful_config("cookies"));
    grid.set_value(rows()).unwrap();
    let err = grid.sort_single("id", SortOrder::Ascending).unwrap_err();
    assert!(matches!(err, GridError::StorageUnavailable(_)));
}

#[test]
fn test_missing_storage_backend_fails() {
    let mut grid =
        DataGrid::new(columns(), stateful_config("local")).with_storage_host(StorageHost::new());
    assert!(matches!(
        grid.save_state(),
        Err(GridError::StorageUnavailable(_))
    ));
    assert!(matches!(
        grid.restore_state(),
        Err(GridError::StorageUnavailable(_))
    ));
}

#[test]
fn test_inactive_features_are_not_persisted() {
    let mut config = Config::default();
    config.state.key = Some("plain".to_string());
    let storage = CountingStorage::default();
    let mut grid = DataGrid::new(columns(), config)
        .with_storage_host(StorageHost::new().with_session(storage.clone()));
    grid.set_value(rows()).unwrap();
    grid.sort_single("id", SortOrder::Ascending).unwrap();

    let bytes = storage.get_item("plain").unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, serde_json::json!({ "sortField": "id", "sortOrder": 1 }));
}
