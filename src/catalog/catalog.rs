//! System catalog for SiltDB
//!
//! The catalog maps table and index names to their definitions and rewrites
//! the whole JSON sidecar on every mutation. The write goes to a temp file
//! in the same directory and is renamed over the sidecar, so a crash
//! mid-write cannot leave truncated metadata behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::schema::{Column, IndexInfo, TableSchema};
use crate::error::{Error, Result};
use crate::storage::PageId;

/// Durable table and index metadata
#[derive(Debug)]
pub struct Catalog {
    tables: RwLock<HashMap<String, TableSchema>>,
    indexes: RwLock<HashMap<String, IndexInfo>>,
    meta_path: PathBuf,
}

/// Serializable shape of the sidecar file
#[derive(Serialize, Deserialize)]
struct CatalogData {
    #[serde(rename = "tables")]
    tables: HashMap<String, TableSchema>,
    #[serde(rename = "indexes")]
    indexes: HashMap<String, IndexInfo>,
}

impl Catalog {
    /// Open the catalog at `meta_path`, loading it if the file exists.
    pub fn open(meta_path: impl AsRef<Path>) -> Result<Self> {
        let meta_path = meta_path.as_ref().to_path_buf();
        let (tables, indexes) = if meta_path.exists() {
            let json = fs::read_to_string(&meta_path)?;
            let data: CatalogData = serde_json::from_str(&json)
                .map_err(|e| Error::CatalogEncoding(e.to_string()))?;
            (data.tables, data.indexes)
        } else {
            (HashMap::new(), HashMap::new())
        };

        Ok(Self {
            tables: RwLock::new(tables),
            indexes: RwLock::new(indexes),
            meta_path,
        })
    }

    /// Register a new table. The caller has already allocated its first
    /// heap page.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<Column>,
        first_page_id: PageId,
    ) -> Result<()> {
        let mut tables = self.tables.write().unwrap();

        if tables.contains_key(name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        tables.insert(
            name.to_string(),
            TableSchema {
                name: name.to_string(),
                columns,
                first_page_id,
            },
        );

        self.save(&tables, &self.indexes.read().unwrap())
    }

    /// Drop a table and every index covering it. Heap pages are not
    /// reclaimed.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write().unwrap();

        if tables.remove(name).is_none() {
            return Err(Error::TableNotFound(name.to_string()));
        }

        let mut indexes = self.indexes.write().unwrap();
        indexes.retain(|_, info| info.table_name != name);

        self.save(&tables, &indexes)
    }

    /// Get a table definition by name.
    pub fn get_table(&self, name: &str) -> Result<TableSchema> {
        self.tables
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// List all table names.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Register an index, resolving the column kind from the table schema.
    pub fn create_index(&self, name: &str, table_name: &str, column_name: &str) -> Result<IndexInfo> {
        let tables = self.tables.read().unwrap();
        let mut indexes = self.indexes.write().unwrap();

        if indexes.contains_key(name) {
            return Err(Error::IndexAlreadyExists(name.to_string()));
        }

        let table = tables
            .get(table_name)
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))?;
        let column_kind = table.column_type(column_name)?;

        let info = IndexInfo {
            name: name.to_string(),
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            column_kind,
        };
        indexes.insert(name.to_string(), info.clone());

        self.save(&tables, &indexes)?;
        Ok(info)
    }

    /// Drop an index definition.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        // Lock order is always tables before indexes.
        let tables = self.tables.read().unwrap();
        let mut indexes = self.indexes.write().unwrap();

        if indexes.remove(name).is_none() {
            return Err(Error::IndexNotFound(name.to_string()));
        }

        self.save(&tables, &indexes)
    }

    /// Get an index definition by name.
    pub fn get_index(&self, name: &str) -> Result<IndexInfo> {
        self.indexes
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// List all index names.
    pub fn list_indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Definitions of every index covering `table_name`.
    pub fn indexes_of(&self, table_name: &str) -> Vec<IndexInfo> {
        self.indexes
            .read()
            .unwrap()
            .values()
            .filter(|info| info.table_name == table_name)
            .cloned()
            .collect()
    }

    /// Rewrite the sidecar: marshal, write to a temp file, rename over.
    fn save(
        &self,
        tables: &HashMap<String, TableSchema>,
        indexes: &HashMap<String, IndexInfo>,
    ) -> Result<()> {
        let data = CatalogData {
            tables: tables.clone(),
            indexes: indexes.clone(),
        };
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| Error::CatalogEncoding(e.to_string()))?;

        let tmp_path = self.meta_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.meta_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use tempfile::TempDir;

    fn user_columns() -> Vec<Column> {
        vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::Text),
        ]
    }

    #[test]
    fn test_create_and_get_table() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("users", user_columns(), 0).unwrap();

        let schema = catalog.get_table("users").unwrap();
        assert_eq!(schema.name, "users");
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.first_page_id, 0);
        assert_eq!(catalog.list_tables(), vec!["users".to_string()]);
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("t", user_columns(), 0).unwrap();
        assert!(matches!(
            catalog.create_table("t", user_columns(), 1),
            Err(Error::TableAlreadyExists(_))
        ));
    }

    #[test]
    fn test_drop_table_removes_indexes() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("users", user_columns(), 0).unwrap();
        catalog.create_index("ix_id", "users", "id").unwrap();

        catalog.drop_table("users").unwrap();
        assert!(matches!(
            catalog.get_table("users"),
            Err(Error::TableNotFound(_))
        ));
        assert!(catalog.list_indexes().is_empty());

        assert!(matches!(
            catalog.drop_table("users"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_create_index_resolves_column_kind() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path().join("meta.json")).unwrap();

        catalog.create_table("users", user_columns(), 0).unwrap();
        let info = catalog.create_index("ix_name", "users", "name").unwrap();
        assert_eq!(info.column_kind, DataType::Text);

        assert!(catalog.create_index("ix_name", "users", "id").is_err());
        assert!(catalog.create_index("ix2", "users", "missing").is_err());
        assert!(catalog.create_index("ix3", "nope", "id").is_err());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");

        {
            let catalog = Catalog::open(&path).unwrap();
            catalog.create_table("users", user_columns(), 3).unwrap();
            catalog.create_index("ix_id", "users", "id").unwrap();
        }

        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.get_table("users").unwrap().first_page_id, 3);
        let info = catalog.get_index("ix_id").unwrap();
        assert_eq!(info.table_name, "users");
        assert_eq!(info.column_kind, DataType::Int);
        assert_eq!(catalog.indexes_of("users").len(), 1);
    }
}
