//! Core data model: tracked processes and the table that owns them

pub mod models;
pub mod process_table;
