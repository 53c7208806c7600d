//! Transaction state and the operation log
//!
//! A transaction records every heap mutation it performs as a reversible
//! `Operation`. The log is kept in memory only: commit discards it, and
//! rollback replays it in reverse.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::storage::{Row, RowId};

/// Transaction identifier. Id 0 is reserved for auto-commit statements and
/// never appears as a live transaction; real ids start at 1.
pub type TxId = u64;

/// The id used by statements running outside an explicit transaction
pub const AUTO_COMMIT_TX: TxId = 0;

/// Transaction lifecycle states. Committed and Aborted are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Active,
    Committed,
    Aborted,
}

/// The kind of a logged operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

/// One reversible heap mutation
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OpKind,
    pub table_name: String,
    /// Address the operation applied to: the old row for updates and
    /// deletes, the inserted row for inserts
    pub row_id: RowId,
    /// Pre-image, present for Update and Delete
    pub old_row: Option<Row>,
    /// Post-image, present for Insert and Update
    pub new_row: Option<Row>,
}

/// A transaction and its operation log
#[derive(Debug)]
pub struct Transaction {
    pub id: TxId,
    pub start_time: DateTime<Utc>,
    status: Mutex<TxStatus>,
    ops: Mutex<Vec<Operation>>,
}

impl Transaction {
    pub(crate) fn new(id: TxId) -> Self {
        Self {
            id,
            start_time: Utc::now(),
            status: Mutex::new(TxStatus::Active),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> TxStatus {
        *self.status.lock().unwrap()
    }

    pub(crate) fn set_status(&self, status: TxStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Append an operation to the log.
    pub fn record(&self, op: Operation) {
        self.ops.lock().unwrap().push(op);
    }

    /// Snapshot of the log in insertion order.
    pub fn operations(&self) -> Vec<Operation> {
        self.ops.lock().unwrap().clone()
    }
}
