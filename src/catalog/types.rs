//! Data types for SiltDB
//!
//! This module defines the SQL data types supported by the database.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// SQL data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    #[serde(rename = "INT")]
    Int,
    /// UTF-8 text
    #[serde(rename = "TEXT")]
    Text,
    /// Boolean
    #[serde(rename = "BOOLEAN")]
    Boolean,
    /// 64-bit IEEE-754 float
    #[serde(rename = "FLOAT")]
    Float,
    /// Date, stored as seconds since the unix epoch
    #[serde(rename = "DATE")]
    Date,
}

impl DataType {
    /// Parse a SQL type string into a data type.
    ///
    /// Several spellings map onto each storage kind, the way most SQL
    /// dialects alias their numeric and string types.
    pub fn parse(type_str: &str) -> Result<Self> {
        match type_str.to_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" => Ok(DataType::Int),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Ok(DataType::Text),
            "BOOL" | "BOOLEAN" | "TINYINT" => Ok(DataType::Boolean),
            "FLOAT" | "DOUBLE" | "REAL" => Ok(DataType::Float),
            "DATE" | "DATETIME" | "TIMESTAMP" => Ok(DataType::Date),
            other => Err(Error::UnsupportedDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Date => write!(f, "DATE"),
        }
    }
}
