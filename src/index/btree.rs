//! B-Tree secondary index
//!
//! An index is an ordered collection of `(key, row-id)` entries over one
//! column of one table. Entries order by key first and row address second,
//! which makes every equal-key group a contiguous run: a point lookup is a
//! forward range from `(key, RowId{0,0})` up to the first larger key.
//!
//! Indexes live purely in memory and are rebuilt from the table heap at
//! startup; they own copies of their keys, never references into heap rows.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::RwLock;

use crate::catalog::DataType;
use crate::error::{Error, Result};
use crate::storage::{RowId, Value};

/// A single index entry
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: Value,
    pub row_id: RowId,
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp_total(&other.key)
            .then(self.row_id.cmp(&other.row_id))
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexEntry {}

/// Comparison operators accepted by range lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

/// An in-memory ordered index over one column
#[derive(Debug)]
pub struct Index {
    pub name: String,
    pub table_name: String,
    pub column_name: String,
    pub column_kind: DataType,
    tree: RwLock<BTreeSet<IndexEntry>>,
}

impl Index {
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        column_kind: DataType,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            column_kind,
            tree: RwLock::new(BTreeSet::new()),
        }
    }

    fn check_kind(&self, key: &Value) -> Result<()> {
        if key.data_type() != self.column_kind {
            return Err(Error::TypeMismatch {
                expected: self.column_kind.to_string(),
                found: key.data_type().to_string(),
            });
        }
        Ok(())
    }

    /// Insert an entry. Identical `(key, row-id)` pairs collapse.
    pub fn insert(&self, key: Value, row_id: RowId) -> Result<()> {
        self.check_kind(&key)?;
        self.tree.write().unwrap().replace(IndexEntry { key, row_id });
        Ok(())
    }

    /// Remove the exact entry. Removing an absent entry is a no-op, which
    /// keeps rebuild replays idempotent.
    pub fn delete(&self, key: Value, row_id: RowId) {
        self.tree.write().unwrap().remove(&IndexEntry { key, row_id });
    }

    /// Point lookup: every row address whose key equals `key`, in ascending
    /// `(page_id, row_index)` order.
    pub fn search(&self, key: &Value) -> Result<Vec<RowId>> {
        self.check_kind(key)?;

        let start = IndexEntry {
            key: key.clone(),
            row_id: RowId::default(),
        };

        let tree = self.tree.read().unwrap();
        Ok(tree
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|entry| entry.key.cmp_total(key) == Ordering::Equal)
            .map(|entry| entry.row_id)
            .collect())
    }

    /// Range lookup: every row address whose key stands in relation `op` to
    /// `key`, in ascending key order then ascending row address.
    pub fn range(&self, op: RangeOp, key: &Value) -> Result<Vec<RowId>> {
        self.check_kind(key)?;

        let boundary = IndexEntry {
            key: key.clone(),
            row_id: RowId::default(),
        };

        let tree = self.tree.read().unwrap();
        let row_ids = match op {
            // The boundary sorts below every entry carrying `key`, so an
            // exclusive upper bound on it yields exactly the keys below.
            RangeOp::Less => tree.range(..boundary).map(|e| e.row_id).collect(),
            RangeOp::LessEq => tree
                .iter()
                .take_while(|e| e.key.cmp_total(key) != Ordering::Greater)
                .map(|e| e.row_id)
                .collect(),
            RangeOp::Greater => tree
                .range((Bound::Included(boundary), Bound::Unbounded))
                .filter(|e| e.key.cmp_total(key) == Ordering::Greater)
                .map(|e| e.row_id)
                .collect(),
            RangeOp::GreaterEq => tree
                .range((Bound::Included(boundary), Bound::Unbounded))
                .map(|e| e.row_id)
                .collect(),
        };
        Ok(row_ids)
    }

    /// Number of entries in the index
    pub fn count(&self) -> usize {
        self.tree.read().unwrap().len()
    }

    /// Drop every entry, leaving the definition intact (used by rebuilds).
    pub fn clear(&self) {
        self.tree.write().unwrap().clear();
    }
}
