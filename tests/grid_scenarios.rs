use grid_state::config::config::Config;
use grid_state::data::data_exporter::{ExportOptions, ExportScope};
use grid_state::data::datatable::{ColumnDescriptor, DataRow, DataValue};
use grid_state::state::{Channel, GridEvent};
use grid_state::table::filter::{FilterConstraint, FilterOperator};
use grid_state::table::filter_service::match_modes::{CONTAINS, ENDS_WITH, STARTS_WITH};
use grid_state::table::selection::{RowClick, SelectionMode, SelectionOutcome};
use grid_state::table::sort::{SortMeta, SortMode, SortOrder};
use grid_state::{DataGrid, GridError};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id").with_header("Id"),
        ColumnDescriptor::new("name").with_header("Name"),
        ColumnDescriptor::new("team").with_header("Team"),
    ]
}

fn people() -> Vec<DataRow> {
    vec![
        DataRow::new().with("id", 1).with("name", "carol").with("team", "red"),
        DataRow::new().with("id", 2).with("name", "alice").with("team", "blue"),
        DataRow::new().with("id", 3).with("name", "bob").with("team", "red"),
        DataRow::new().with("id", 4).with("name", "anna").with("team", "blue"),
        DataRow::new().with("id", 5).with("name", "dave").with("team", "green"),
    ]
}

fn ids(grid: &DataGrid) -> Vec<String> {
    grid.processed_rows()
        .iter()
        .filter_map(|row| row.key_for("id"))
        .collect()
}

fn multi_select_config() -> Config {
    let mut config = Config::default();
    config.table.data_key = Some("id".to_string());
    config.selection.mode = SelectionMode::Multiple;
    config
}

#[test]
fn test_two_row_sort_and_filter_example() {
    let mut grid = DataGrid::new(
        vec![ColumnDescriptor::new("id"), ColumnDescriptor::new("name")],
        Config::default(),
    );
    grid.set_value(vec![
        DataRow::new().with("id", 1).with("name", "b"),
        DataRow::new().with("id", 2).with("name", "a"),
    ])
    .unwrap();

    grid.sort("name", false).unwrap();
    assert_eq!(ids(&grid), vec!["2", "1"]);
    grid.sort("name", false).unwrap();
    assert_eq!(ids(&grid), vec!["1", "2"]);

    grid.filter("name", DataValue::from("a"), Some(STARTS_WITH), Instant::now());
    grid.force_filter().unwrap();
    assert_eq!(ids(&grid), vec!["2"]);

    grid.filter("name", DataValue::Null, Some(STARTS_WITH), Instant::now());
    grid.force_filter().unwrap();
    assert_eq!(grid.processed_rows().len(), 2);
    assert!(!grid.filter_engine().has_filter());
}

#[test]
fn test_multi_sort_tie_break() {
    let mut config = Config::default();
    config.sort.mode = SortMode::Multiple;
    let mut grid = DataGrid::new(columns(), config);
    grid.set_value(people()).unwrap();

    grid.sort_multiple(vec![
        SortMeta::new("team", SortOrder::Ascending),
        SortMeta::new("name", SortOrder::Descending),
    ])
    .unwrap();
    // blue: anna, alice; green: dave; red: carol, bob
    assert_eq!(ids(&grid), vec!["4", "2", "5", "1", "3"]);
    assert!(grid.sort_engine().is_sorted("name"));
    assert!(!grid.sort_engine().is_sorted("id"));
}

#[test]
fn test_header_clicks_in_multiple_mode() {
    let mut config = Config::default();
    config.sort.mode = SortMode::Multiple;
    let mut grid = DataGrid::new(columns(), config);
    grid.set_value(people()).unwrap();

    grid.sort("team", false).unwrap();
    grid.sort("name", true).unwrap();
    assert_eq!(
        grid.sort_engine().multi_sort_meta().unwrap(),
        &[
            SortMeta::new("team", SortOrder::Ascending),
            SortMeta::new("name", SortOrder::Ascending),
        ]
    );
    assert_eq!(ids(&grid), vec!["2", "4", "5", "3", "1"]);
}

#[test]
fn test_menu_filter_and_or() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();

    grid.set_filter_constraints(
        "name",
        vec![
            FilterConstraint::new("a", STARTS_WITH).with_operator(FilterOperator::And),
            FilterConstraint::new("e", ENDS_WITH),
        ],
    )
    .unwrap();
    assert_eq!(ids(&grid), vec!["2"]);

    grid.set_filter_constraints(
        "name",
        vec![
            FilterConstraint::new("a", STARTS_WITH).with_operator(FilterOperator::Or),
            FilterConstraint::new("e", ENDS_WITH),
        ],
    )
    .unwrap();
    assert_eq!(ids(&grid), vec!["2", "4", "5"]);
}

#[test]
fn test_global_filter_combines_with_local() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();
    let now = Instant::now();

    grid.filter_global(DataValue::from("re"), Some(CONTAINS), now);
    grid.force_filter().unwrap();
    // "re" matches red, and green
    assert_eq!(ids(&grid), vec!["1", "3", "5"]);

    grid.filter("name", DataValue::from("b"), Some(STARTS_WITH), now);
    grid.force_filter().unwrap();
    assert_eq!(ids(&grid), vec!["3"]);
}

#[test]
fn test_global_filter_without_fields_is_a_configuration_error() {
    let mut grid = DataGrid::new(Vec::new(), Config::default());
    grid.set_value(people()).unwrap();
    grid.filter_global(DataValue::from("x"), None, Instant::now());
    let err = grid.force_filter().unwrap_err();
    assert!(matches!(err, GridError::Configuration(_)));
}

#[test]
fn test_selection_keys_track_every_mutation() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();

    let check = |grid: &DataGrid| {
        for row in grid.value() {
            let key = row.key_for("id").unwrap();
            assert_eq!(
                grid.selection_manager().selection_keys().contains(&key),
                grid.selection().contains(row)
            );
        }
    };

    grid.handle_row_click(0, RowClick::plain()).unwrap();
    check(&grid);
    grid.handle_row_click(3, RowClick::shift()).unwrap();
    check(&grid);
    assert_eq!(grid.selection().len(), 4);
    grid.toggle_row_with_checkbox(1).unwrap();
    check(&grid);
    grid.toggle_all(true).unwrap();
    check(&grid);
    assert!(grid.all_selected());
    grid.toggle_all(false).unwrap();
    check(&grid);
    assert!(grid.selection().is_empty());
}

#[test]
fn test_selection_event_sees_synced_keys() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    grid.subscribe_fn(Channel::SelectionChanged, "recorder", move |event| {
        if let GridEvent::SelectionChanged { selection } = event {
            sink.borrow_mut().push(selection.len());
        }
    });

    grid.select_range(3, 1).unwrap();
    grid.toggle_row_with_checkbox(2).unwrap();
    assert_eq!(*seen.borrow(), vec![3, 2]);
}

#[test]
fn test_vetoed_selection_is_silent() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();
    grid.set_row_selectable(Some(Box::new(|row: &DataRow, _: usize| {
        row.get("team") != Some(&DataValue::from("green"))
    })));

    let seen = Rc::new(RefCell::new(0));
    let sink = seen.clone();
    grid.subscribe_fn(Channel::SelectionChanged, "counter", move |_| {
        *sink.borrow_mut() += 1;
    });

    assert_eq!(
        grid.toggle_row_with_checkbox(4).unwrap(),
        SelectionOutcome::Unchanged
    );
    assert_eq!(*seen.borrow(), 0);

    grid.toggle_all(true).unwrap();
    assert_eq!(grid.selection().len(), 4);
}

#[test]
fn test_page_only_toggle_all() {
    let mut config = multi_select_config();
    config.table.paginator = true;
    config.table.rows = 2;
    config.selection.page_only = true;
    let mut grid = DataGrid::new(columns(), config);
    grid.set_value(people()).unwrap();

    grid.toggle_all(true).unwrap();
    grid.set_page(2, 2).unwrap();
    grid.toggle_all(true).unwrap();
    assert_eq!(grid.selection().len(), 4);

    grid.toggle_all(false).unwrap();
    let keys: Vec<String> = grid
        .selection()
        .iter()
        .filter_map(|r| r.key_for("id"))
        .collect();
    assert_eq!(keys, vec!["1", "2"]);
}

#[test]
fn test_bound_select_all_is_reported() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();
    grid.bind_select_all(Some(false));
    assert_eq!(
        grid.toggle_all(true).unwrap(),
        SelectionOutcome::SelectAllRequested(true)
    );
    assert!(grid.selection().is_empty());
}

#[test]
fn test_row_expansion_and_editing_need_data_key() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();
    let row = grid.value()[0].clone();

    assert!(matches!(
        grid.toggle_row(&row),
        Err(GridError::Configuration(_))
    ));
    assert!(matches!(
        grid.init_row_edit(0),
        Err(GridError::Configuration(_))
    ));
}

#[test]
fn test_columns_reorder_publishes() {
    let mut config = Config::default();
    config.columns.reorderable = true;
    let mut grid = DataGrid::new(columns(), config);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    grid.subscribe_fn(Channel::ColumnsChanged, "columns", move |event| {
        if let GridEvent::ColumnsChanged(columns) = event {
            sink.borrow_mut()
                .push(columns.iter().map(|c| c.field.clone()).collect::<Vec<_>>());
        }
    });

    assert!(grid.reorder_column(0, 2).unwrap());
    assert!(grid.move_column_left(0).unwrap());
    assert_eq!(
        *seen.borrow(),
        vec![
            vec!["name".to_string(), "team".to_string(), "id".to_string()],
            vec!["team".to_string(), "id".to_string(), "name".to_string()],
        ]
    );
}

#[test]
fn test_export_scopes() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();
    grid.filter("team", DataValue::from("blue"), None, Instant::now());
    grid.force_filter().unwrap();
    grid.toggle_row_with_checkbox(0).unwrap();

    let filtered = grid.export_csv(&ExportOptions::default()).unwrap();
    assert_eq!(
        filtered,
        "\"Id\",\"Name\",\"Team\"\n\"2\",\"alice\",\"blue\"\n\"4\",\"anna\",\"blue\""
    );

    let selection = grid
        .export_csv(&ExportOptions::default().with_scope(ExportScope::Selection))
        .unwrap();
    assert_eq!(selection.lines().count(), 2);

    let all = grid
        .export_csv(
            &ExportOptions::default()
                .with_scope(ExportScope::AllValues)
                .with_separator(';'),
        )
        .unwrap();
    assert_eq!(all.lines().count(), 6);
    assert!(all.starts_with("\"Id\";\"Name\";\"Team\""));
}

#[test]
fn test_cell_edit_commit_and_navigation() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();

    grid.open_cell(0, "name");
    grid.set_edit_value("name", DataValue::from("carla"));
    grid.move_to_next_cell();
    assert_eq!(
        grid.edit_session().and_then(|s| s.field.clone()).as_deref(),
        Some("team")
    );
    assert_eq!(grid.value()[0].get("name"), Some(&DataValue::from("carla")));

    grid.move_to_previous_cell();
    grid.cancel_edit();
    assert_eq!(grid.value()[0].get("name"), Some(&DataValue::from("carla")));
    assert!(grid.edit_session().is_none());
}

fn name_of(grid: &DataGrid, id: i64) -> Option<DataValue> {
    grid.value()
        .iter()
        .find(|row| row.get("id") == Some(&DataValue::from(id)))
        .and_then(|row| row.get("name").cloned())
}

#[test]
fn test_cancel_after_sort_restores_the_edited_row() {
    let mut grid = DataGrid::new(
        vec![ColumnDescriptor::new("id"), ColumnDescriptor::new("name")],
        Config::default(),
    );
    grid.set_value(vec![
        DataRow::new().with("id", 1).with("name", "b"),
        DataRow::new().with("id", 2).with("name", "a"),
    ])
    .unwrap();

    grid.open_cell(0, "name");
    grid.set_edit_value("name", DataValue::from("z"));
    grid.sort("name", false).unwrap();
    assert_eq!(ids(&grid), vec!["2", "1"]);
    assert_eq!(grid.edit_session().map(|s| s.row_index), Some(1));

    grid.cancel_edit();
    assert_eq!(name_of(&grid, 1), Some(DataValue::from("b")));
    assert_eq!(name_of(&grid, 2), Some(DataValue::from("a")));
}

#[test]
fn test_sort_during_pending_filter_clear_shows_every_row() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();
    grid.filter("name", DataValue::from("a"), Some(STARTS_WITH), Instant::now());
    grid.force_filter().unwrap();
    assert_eq!(ids(&grid), vec!["2", "4"]);

    let cleared_at = Instant::now();
    grid.filter("name", DataValue::Null, Some(STARTS_WITH), cleared_at);
    grid.sort("id", false).unwrap();
    grid.sort("id", false).unwrap();
    assert!(!grid.filter_engine().has_filter());
    assert_eq!(ids(&grid), vec!["5", "4", "3", "2", "1"]);

    assert!(grid.poll_filter(cleared_at + Duration::from_millis(300)).unwrap());
    assert_eq!(ids(&grid), vec!["5", "4", "3", "2", "1"]);
}

#[test]
fn test_range_over_selected_rows_publishes_only_real_changes() {
    let mut grid = DataGrid::new(columns(), multi_select_config());
    grid.set_value(people()).unwrap();

    let seen = Rc::new(RefCell::new(0));
    let sink = seen.clone();
    grid.subscribe_fn(Channel::SelectionChanged, "counter", move |_| {
        *sink.borrow_mut() += 1;
    });

    grid.toggle_row_with_checkbox(1).unwrap();
    assert_eq!(*seen.borrow(), 1);

    assert_eq!(grid.select_range(0, 2).unwrap(), SelectionOutcome::Changed);
    assert_eq!(grid.selection().len(), 3);
    assert_eq!(*seen.borrow(), 2);

    assert_eq!(grid.select_range(2, 0).unwrap(), SelectionOutcome::Unchanged);
    assert_eq!(grid.select_range(1, 1).unwrap(), SelectionOutcome::Unchanged);
    assert_eq!(grid.selection().len(), 3);
    assert_eq!(*seen.borrow(), 2);
}

#[test]
fn test_new_value_keeps_active_sort_and_filter() {
    let mut grid = DataGrid::new(columns(), Config::default());
    grid.set_value(people()).unwrap();
    grid.sort("name", false).unwrap();
    grid.filter("team", DataValue::from("blue"), None, Instant::now());
    grid.force_filter().unwrap();
    assert_eq!(ids(&grid), vec!["2", "4"]);

    let mut rows = people();
    rows.push(DataRow::new().with("id", 6).with("name", "aaron").with("team", "blue"));
    rows.push(DataRow::new().with("id", 7).with("name", "abe").with("team", "red"));
    grid.set_value(rows).unwrap();

    assert_eq!(ids(&grid), vec!["6", "2", "4"]);
    assert_eq!(grid.pagination().total_records(), 3);
}

#[test]
fn test_sort_single_in_multiple_mode() {
    let mut config = Config::default();
    config.sort.mode = SortMode::Multiple;
    let mut grid = DataGrid::new(columns(), config);
    grid.set_value(people()).unwrap();

    grid.sort_single("name", SortOrder::Descending).unwrap();
    assert_eq!(ids(&grid), vec!["5", "1", "3", "4", "2"]);
    assert_eq!(
        grid.sort_engine().multi_sort_meta().unwrap(),
        &[SortMeta::new("name", SortOrder::Descending)]
    );
}
