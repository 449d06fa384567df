//! Grid state components and the controller that drives them

pub mod columns;
pub mod controller;
pub mod edit;
pub mod expansion;
pub mod filter;
pub mod filter_service;
pub mod pagination;
pub mod persistence;
pub mod selection;
pub mod sort;

pub use controller::DataGrid;
