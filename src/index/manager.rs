//! Index manager for SiltDB
//!
//! A registry of live indexes keyed by name. DML paths call `on_insert` and
//! `on_delete` with the affected row so that every covering index of the
//! table stays consistent with the heap.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::btree::Index;
use crate::catalog::DataType;
use crate::error::{Error, Result};
use crate::storage::Row;

/// Registry of indexes by name
#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: RwLock<HashMap<String, Arc<Index>>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index. The caller populates it from the heap.
    pub fn create(
        &self,
        name: &str,
        table_name: &str,
        column_name: &str,
        column_kind: DataType,
    ) -> Result<Arc<Index>> {
        let mut indexes = self.indexes.write().unwrap();

        if indexes.contains_key(name) {
            return Err(Error::IndexAlreadyExists(name.to_string()));
        }

        let index = Arc::new(Index::new(name, table_name, column_name, column_kind));
        indexes.insert(name.to_string(), index.clone());
        Ok(index)
    }

    /// Drop an index from the registry.
    pub fn drop(&self, name: &str) -> Result<()> {
        let mut indexes = self.indexes.write().unwrap();

        if indexes.remove(name).is_none() {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Get an index by name.
    pub fn get(&self, name: &str) -> Result<Arc<Index>> {
        self.indexes
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    /// List all index names.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every index covering `table_name`.
    pub fn by_table(&self, table_name: &str) -> Vec<Arc<Index>> {
        self.indexes
            .read()
            .unwrap()
            .values()
            .filter(|idx| idx.table_name == table_name)
            .cloned()
            .collect()
    }

    /// The index over `(table_name, column_name)`, if one exists.
    pub fn by_column(&self, table_name: &str, column_name: &str) -> Option<Arc<Index>> {
        self.indexes
            .read()
            .unwrap()
            .values()
            .find(|idx| idx.table_name == table_name && idx.column_name == column_name)
            .cloned()
    }

    /// Mirror a freshly inserted row into every covering index.
    pub fn on_insert(&self, table_name: &str, row: &Row, column_names: &[String]) -> Result<()> {
        for index in self.by_table(table_name) {
            if let Some(pos) = column_names.iter().position(|c| *c == index.column_name) {
                index.insert(row.values[pos].clone(), row.id)?;
            }
        }
        Ok(())
    }

    /// Remove a deleted row from every covering index.
    pub fn on_delete(&self, table_name: &str, row: &Row, column_names: &[String]) {
        for index in self.by_table(table_name) {
            if let Some(pos) = column_names.iter().position(|c| *c == index.column_name) {
                index.delete(row.values[pos].clone(), row.id);
            }
        }
    }

    /// Rebuild every index of `table_name` from the given live rows.
    ///
    /// Used after a rollback, where replaying the heap inverse operations
    /// may have left the in-memory trees out of step with the heap.
    pub fn rebuild_table(
        &self,
        table_name: &str,
        column_names: &[String],
        rows: &[Row],
    ) -> Result<()> {
        for index in self.by_table(table_name) {
            index.clear();
            let pos = match column_names.iter().position(|c| *c == index.column_name) {
                Some(pos) => pos,
                None => continue,
            };
            for row in rows {
                index.insert(row.values[pos].clone(), row.id)?;
            }
        }
        Ok(())
    }
}
