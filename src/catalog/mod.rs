//! System catalog module
//!
//! Durable metadata about tables and indexes, persisted to a JSON sidecar
//! file next to the database file.

mod catalog;
mod schema;
mod types;

pub use catalog::Catalog;
pub use schema::{Column, IndexInfo, TableSchema};
pub use types::DataType;
