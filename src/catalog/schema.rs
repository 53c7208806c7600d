//! Table and index metadata
//!
//! These are the shapes persisted to the catalog sidecar file; the serde
//! renames pin the JSON field names as part of the on-disk format.

use serde::{Deserialize, Serialize};

use super::types::DataType;
use crate::error::{Error, Result};
use crate::storage::PageId;

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: DataType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A table definition: its columns and the root of its heap chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Columns")]
    pub columns: Vec<Column>,
    #[serde(rename = "FirstPageID")]
    pub first_page_id: PageId,
}

impl TableSchema {
    /// Position of `column_name` in the schema. Names are compared
    /// case-sensitively.
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column_name)
    }

    /// Data type of `column_name`, or ColumnNotFound.
    pub fn column_type(&self, column_name: &str) -> Result<DataType> {
        self.column_index(column_name)
            .map(|i| self.columns[i].kind)
            .ok_or_else(|| Error::ColumnNotFound(column_name.to_string(), self.name.clone()))
    }

    /// All column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Metadata for a single-column secondary index
///
/// Only the definition is persisted; the index content is rebuilt from the
/// table heap at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TableName")]
    pub table_name: String,
    #[serde(rename = "ColumnName")]
    pub column_name: String,
    #[serde(rename = "ColumnType")]
    pub column_kind: DataType,
}
