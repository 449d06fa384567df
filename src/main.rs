use anyhow::{anyhow, Context, Result};
use grid_state::config::config::Config;
use grid_state::data::data_exporter::{DataExporter, ExportOptions, ExportScope};
use grid_state::data::datatable::{load_rows_from_json_str, ColumnDescriptor, DataRow, DataValue};
use grid_state::table::selection::SelectionMode;
use grid_state::table::sort::{SortMeta, SortMode, SortOrder};
use grid_state::utils::logging::init_tracing;
use grid_state::DataGrid;
use std::fs;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CliOptions {
    data_file: Option<String>,
    sorts: Vec<SortMeta>,
    filters: Vec<(String, Option<String>, String)>,
    global: Option<String>,
    page: Option<(usize, usize)>,
    select: Vec<String>,
    separator: Option<char>,
}

fn print_usage() {
    println!("Usage: grid-state <rows.json> [options]");
    println!();
    println!("Options:");
    println!("  --sort <field[:desc]>          Sort by a field; repeat for multi-field sort");
    println!("  --filter <field=[mode:]value>  Filter a field (default mode from config)");
    println!("  --global <value>               Global filter across all columns");
    println!("  --page <first:rows>            Print one page of the result");
    println!("  --select <key,...>             Export only rows with these Data Key values");
    println!("  --separator <char>             CSV separator");
    println!("  --generate-config              Print a commented default config");
}

fn next_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a String> {
    iter.next()
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sort" => {
                let spec = next_value(&mut iter, "--sort")?;
                let (field, order) = match spec.split_once(':') {
                    Some((field, "desc")) => (field, SortOrder::Descending),
                    Some((field, "asc")) => (field, SortOrder::Ascending),
                    Some((_, other)) => return Err(anyhow!("unknown sort direction: {}", other)),
                    None => (spec.as_str(), SortOrder::Ascending),
                };
                options.sorts.push(SortMeta::new(field, order));
            }
            "--filter" => {
                let spec = next_value(&mut iter, "--filter")?;
                let (field, rest) = spec
                    .split_once('=')
                    .ok_or_else(|| anyhow!("filter must look like field=[mode:]value"))?;
                let (mode, value) = match rest.split_once(':') {
                    Some((mode, value)) => (Some(mode.to_string()), value.to_string()),
                    None => (None, rest.to_string()),
                };
                options.filters.push((field.to_string(), mode, value));
            }
            "--global" => options.global = Some(next_value(&mut iter, "--global")?.clone()),
            "--page" => {
                let spec = next_value(&mut iter, "--page")?;
                let (first, rows) = spec
                    .split_once(':')
                    .ok_or_else(|| anyhow!("page must look like first:rows"))?;
                options.page = Some((first.parse()?, rows.parse()?));
            }
            "--select" => {
                let keys = next_value(&mut iter, "--select")?;
                options.select = keys.split(',').map(|k| k.trim().to_string()).collect();
            }
            "--separator" => {
                let sep = next_value(&mut iter, "--separator")?;
                let mut chars = sep.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => options.separator = Some(c),
                    _ => return Err(anyhow!("separator must be a single character")),
                }
            }
            other if other.starts_with("--") => return Err(anyhow!("unknown option: {}", other)),
            other => options.data_file = Some(other.to_string()),
        }
    }

    Ok(options)
}

/// Columns in first-seen field order across all rows
fn infer_columns(rows: &[DataRow]) -> Vec<ColumnDescriptor> {
    let mut fields: Vec<String> = Vec::new();
    for row in rows {
        for field in row.fields().keys() {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }
    fields.into_iter().map(ColumnDescriptor::new).collect()
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    if args.iter().any(|a| a == "--generate-config") {
        println!("{}", Config::create_default_with_comments());
        return Ok(());
    }

    init_tracing("warn");

    let options = parse_args(&args)?;
    let Some(data_file) = options.data_file.as_deref() else {
        print_usage();
        return Err(anyhow!("no data file given"));
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Using default config: {}", e);
        Config::default()
    });
    // one-shot runs never persist grid state
    config.state.key = None;
    config.table.lazy = false;
    if options.sorts.len() > 1 {
        config.sort.mode = SortMode::Multiple;
    }
    if !options.select.is_empty() {
        config.selection.mode = SelectionMode::Multiple;
        config.table.data_key.get_or_insert_with(|| "id".to_string());
    }
    if options.page.is_some() {
        config.table.paginator = true;
    }
    let separator = options.separator.unwrap_or(config.export.csv_separator);

    let contents =
        fs::read_to_string(data_file).with_context(|| format!("reading {}", data_file))?;
    let rows = load_rows_from_json_str(&contents)
        .with_context(|| format!("parsing {}", data_file))?;
    debug!("Loaded {} rows from {}", rows.len(), data_file);

    let data_key = config.table.data_key.clone();
    let mut grid = DataGrid::new(infer_columns(&rows), config);
    grid.set_value(rows)?;

    match options.sorts.len() {
        0 => {}
        1 => grid.sort_single(&options.sorts[0].field, options.sorts[0].order)?,
        _ => grid.sort_multiple(options.sorts.clone())?,
    }

    let now = Instant::now();
    for (field, mode, value) in &options.filters {
        grid.filter(field, DataValue::from(value.as_str()), mode.as_deref(), now);
    }
    if let Some(global) = &options.global {
        grid.filter_global(DataValue::from(global.as_str()), None, now);
    }
    if !options.filters.is_empty() || options.global.is_some() {
        grid.force_filter()?;
    }

    let mut export = ExportOptions::default().with_separator(separator);

    if let Some(key_field) = data_key.filter(|_| !options.select.is_empty()) {
        let selected: Vec<DataRow> = grid
            .value()
            .iter()
            .filter(|row| {
                row.key_for(&key_field)
                    .is_some_and(|key| options.select.contains(&key))
            })
            .cloned()
            .collect();
        grid.set_selection(selected)?;
        export = export.with_scope(ExportScope::Selection);
    }

    let output = match options.page {
        Some((first, page_rows)) if export.scope == ExportScope::Filtered => {
            grid.set_page(first, page_rows)?;
            DataExporter::export_csv(grid.columns(), grid.visible_rows(), separator, None)?
        }
        _ => grid.export_csv(&export)?,
    };

    println!("{}", output);
    Ok(())
}
