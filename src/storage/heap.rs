//! Table heap storage for SiltDB
//!
//! A table's rows live in a singly linked chain of pages rooted at the
//! table's first page id. Rows are never moved or reclaimed: deletes flip a
//! one-byte tombstone, and updates tombstone the old row and insert the new
//! one at the end of the heap, so a row's address stays valid until the row
//! itself is rewritten.

use std::sync::Arc;

use super::page::{PageId, PageKind};
use super::pager::Pager;
use super::value::Value;
use crate::error::{Error, Result};

/// A logical row address: page id plus the row's slot within that page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RowId {
    pub page_id: PageId,
    pub row_index: u16,
}

impl RowId {
    pub fn new(page_id: PageId, row_index: u16) -> Self {
        Self { page_id, row_index }
    }
}

/// A row of values plus its storage bookkeeping
///
/// On-disk form: `[tombstone u8][u16 column-count][V1…Vn]`. The id and the
/// originating transaction are in-memory only; the id is assigned when the
/// row is materialized from a page or written into one.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Address of the row's slot
    pub id: RowId,
    /// Tombstone flag
    pub deleted: bool,
    /// Transaction that produced this version, 0 in auto-commit
    pub tx_id: u64,
    /// Column values in schema order
    pub values: Vec<Value>,
}

impl Row {
    /// Create a live row from values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            id: RowId::default(),
            deleted: false,
            tx_id: 0,
            values,
        }
    }

    /// Serialize the row to its on-disk form
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(if self.deleted { 1 } else { 0 });
        buf.extend_from_slice(&(self.values.len() as u16).to_le_bytes());
        for value in &self.values {
            buf.extend_from_slice(&value.serialize());
        }
        buf
    }

    /// Deserialize a row, checking the column count against the schema
    pub fn deserialize(data: &[u8], num_columns: usize) -> Result<Self> {
        if data.len() < 3 {
            return Err(Error::ShortRead);
        }

        let deleted = data[0] != 0;
        let col_count = u16::from_le_bytes([data[1], data[2]]) as usize;
        if col_count != num_columns {
            return Err(Error::ColumnCountMismatch {
                expected: num_columns,
                found: col_count,
            });
        }

        let mut values = Vec::with_capacity(col_count);
        let mut offset = 3;
        for _ in 0..col_count {
            let (value, consumed) = Value::deserialize(&data[offset..])?;
            values.push(value);
            offset += consumed;
        }

        Ok(Self {
            id: RowId::default(),
            deleted,
            tx_id: 0,
            values,
        })
    }
}

/// Heap storage for one table
#[derive(Debug, Clone)]
pub struct TableHeap {
    pager: Arc<Pager>,
    first_page_id: PageId,
    num_columns: usize,
}

impl TableHeap {
    /// Allocate the first page of a new table, returning its id.
    pub fn create(pager: &Arc<Pager>) -> Result<PageId> {
        let handle = pager.allocate(PageKind::Table)?;
        let id = handle.read().unwrap().id;
        Ok(id)
    }

    /// Open the heap rooted at `first_page_id`.
    pub fn open(pager: Arc<Pager>, first_page_id: PageId, num_columns: usize) -> Self {
        Self {
            pager,
            first_page_id,
            num_columns,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Insert a row, walking the chain for a page with room and linking a
    /// fresh page at the end when none has any.
    ///
    /// Sets `row.id` to the slot the row landed in and returns it.
    pub fn insert(&self, row: &mut Row) -> Result<RowId> {
        if row.values.len() != self.num_columns {
            return Err(Error::ColumnCountMismatch {
                expected: self.num_columns,
                found: row.values.len(),
            });
        }

        let row_data = row.serialize();
        let mut current_id = self.first_page_id;

        loop {
            let handle = self.pager.get(current_id)?;
            let (written, next_page, was_empty) = {
                let mut page = handle.write().unwrap();
                match page.write_row(&row_data) {
                    Ok(_) => (Some(page.row_count - 1), 0, false),
                    Err(Error::PageFull(_)) => (None, page.next_page, page.row_count == 0),
                    Err(e) => return Err(e),
                }
            };

            if let Some(row_index) = written {
                self.pager.flush(current_id)?;
                let id = RowId::new(current_id, row_index);
                row.id = id;
                return Ok(id);
            }

            // A row that cannot fit in an empty page will never fit.
            if was_empty {
                return Err(Error::PageFull(current_id));
            }

            if next_page == 0 {
                let new_handle = self.pager.allocate(PageKind::Table)?;
                let new_id = new_handle.read().unwrap().id;
                handle.write().unwrap().next_page = new_id;
                self.pager.flush(current_id)?;
                current_id = new_id;
            } else {
                current_id = next_page;
            }
        }
    }

    /// Read every row in the heap, in slot order within each page and page
    /// order along the chain.
    pub fn read_all(&self, include_tombstoned: bool) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut current_id = self.first_page_id;

        loop {
            let handle = self.pager.get(current_id)?;
            let (records, next_page) = {
                let page = handle.read().unwrap();
                (page.read_all()?, page.next_page)
            };

            for (index, record) in records.iter().enumerate() {
                let mut row = Row::deserialize(record, self.num_columns)?;
                row.id = RowId::new(current_id, index as u16);
                if !row.deleted || include_tombstoned {
                    rows.push(row);
                }
            }

            if next_page == 0 {
                break;
            }
            current_id = next_page;
        }

        Ok(rows)
    }

    /// Read one row by its address.
    pub fn row(&self, id: RowId) -> Result<Row> {
        let handle = self.pager.get(id.page_id)?;
        let record = handle.read().unwrap().read_row(id.row_index)?;
        let mut row = Row::deserialize(&record, self.num_columns)?;
        row.id = id;
        Ok(row)
    }

    /// Set the tombstone flag on the row at `id`.
    pub fn mark_deleted(&self, id: RowId) -> Result<()> {
        self.set_tombstone(id, true)
    }

    /// Clear the tombstone flag, reviving the row (rollback of a delete).
    pub fn clear_deleted(&self, id: RowId) -> Result<()> {
        self.set_tombstone(id, false)
    }

    fn set_tombstone(&self, id: RowId, deleted: bool) -> Result<()> {
        let handle = self.pager.get(id.page_id)?;
        {
            let mut page = handle.write().unwrap();
            let record = page.read_row(id.row_index)?;
            let mut row = Row::deserialize(&record, self.num_columns)?;
            row.deleted = deleted;
            // Only the flag byte changed, so the record length is unchanged
            // and the in-place update always fits.
            page.update_row(id.row_index, &row.serialize())?;
        }
        self.pager.flush(id.page_id)
    }

    /// Update a row: tombstone the old slot and insert the new version.
    ///
    /// The new row receives a fresh address, returned to the caller.
    pub fn update(&self, id: RowId, new_row: &mut Row) -> Result<RowId> {
        self.mark_deleted(id)?;
        self.insert(new_row)
    }
}
