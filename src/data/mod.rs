//! Data layer: the row model, value comparison and CSV export

pub mod data_exporter;
pub mod datatable;
pub mod datavalue_compare;
