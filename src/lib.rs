pub mod config;
pub mod data;
pub mod debouncer;
pub mod error;
pub mod state;
pub mod table;
pub mod utils;

pub use error::{GridError, Result};
pub use table::DataGrid;
