//! Transaction manager
//!
//! Owns the transaction lifecycle: id allocation, the active-transaction
//! map, atomic commit (flush-on-commit is the durability boundary) and
//! rollback by replaying the operation log in reverse. After a rollback the
//! indexes of every touched table are rebuilt from the heap, since the heap
//! inverses are not mirrored into the trees operation by operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use super::lock::LockManager;
use super::transaction::{OpKind, Operation, Transaction, TxId, TxStatus};
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::storage::{Pager, TableHeap};

/// Transaction lifecycle coordinator
pub struct TransactionManager {
    /// Next id to allocate; live ids start at 1, 0 means auto-commit
    next_id: Mutex<TxId>,
    active: RwLock<HashMap<TxId, Arc<Transaction>>>,
    lock_manager: Arc<LockManager>,
    pager: Arc<Pager>,
    catalog: Arc<Catalog>,
    index_manager: Arc<IndexManager>,
}

impl TransactionManager {
    pub fn new(
        pager: Arc<Pager>,
        catalog: Arc<Catalog>,
        index_manager: Arc<IndexManager>,
    ) -> Self {
        Self {
            next_id: Mutex::new(1),
            active: RwLock::new(HashMap::new()),
            lock_manager: Arc::new(LockManager::new()),
            pager,
            catalog,
            index_manager,
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Start a new transaction.
    pub fn begin(&self) -> Arc<Transaction> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };

        let tx = Arc::new(Transaction::new(id));
        self.active.write().unwrap().insert(id, tx.clone());
        tx
    }

    /// Get an active transaction by id.
    pub fn get(&self, tx_id: TxId) -> Result<Arc<Transaction>> {
        self.active
            .read()
            .unwrap()
            .get(&tx_id)
            .cloned()
            .ok_or(Error::TransactionNotFound(tx_id))
    }

    /// Commit: mark the transaction, release its locks and flush every
    /// dirty page. The statement only returns success once the fsync
    /// inside `flush_all` has completed.
    pub fn commit(&self, tx_id: TxId) -> Result<()> {
        let tx = self
            .active
            .write()
            .unwrap()
            .remove(&tx_id)
            .ok_or(Error::TransactionNotFound(tx_id))?;
        tx.set_status(TxStatus::Committed);

        self.lock_manager.release_all(tx_id);
        self.pager.flush_all()
    }

    /// Rollback: replay the operation log in reverse, rebuild the indexes
    /// of every touched table, release locks, flush.
    pub fn rollback(&self, tx_id: TxId) -> Result<()> {
        let tx = self
            .active
            .write()
            .unwrap()
            .remove(&tx_id)
            .ok_or(Error::TransactionNotFound(tx_id))?;
        tx.set_status(TxStatus::Aborted);

        let operations = tx.operations();
        let mut touched: HashSet<String> = HashSet::new();
        for op in operations.iter().rev() {
            touched.insert(op.table_name.clone());
            if let Err(e) = self.rollback_operation(op) {
                tracing::warn!(
                    transaction = tx_id,
                    table = %op.table_name,
                    "failed to roll back operation: {e}"
                );
            }
        }

        for table_name in touched {
            if let Err(e) = self.rebuild_indexes(&table_name) {
                tracing::warn!(
                    transaction = tx_id,
                    table = %table_name,
                    "failed to rebuild indexes after rollback: {e}"
                );
            }
        }

        self.lock_manager.release_all(tx_id);
        self.pager.flush_all()
    }

    /// Whether `tx_id` has committed. Ids absent from the active map are
    /// treated as committed (READ COMMITTED visibility convention).
    pub fn is_committed(&self, tx_id: TxId) -> bool {
        match self.active.read().unwrap().get(&tx_id) {
            Some(tx) => tx.status() == TxStatus::Committed,
            None => true,
        }
    }

    /// Ids of all active transactions.
    pub fn active_list(&self) -> Vec<TxId> {
        self.active.read().unwrap().keys().copied().collect()
    }

    fn heap_for(&self, table_name: &str) -> Result<TableHeap> {
        let schema = self.catalog.get_table(table_name)?;
        Ok(TableHeap::open(
            self.pager.clone(),
            schema.first_page_id,
            schema.columns.len(),
        ))
    }

    fn rollback_operation(&self, op: &Operation) -> Result<()> {
        let heap = self.heap_for(&op.table_name)?;

        match op.kind {
            OpKind::Insert => {
                let new_row = op
                    .new_row
                    .as_ref()
                    .ok_or_else(|| Error::ExecutionError("insert log has no row".to_string()))?;
                heap.mark_deleted(new_row.id)
            }
            OpKind::Update => {
                let new_row = op
                    .new_row
                    .as_ref()
                    .ok_or_else(|| Error::ExecutionError("update log has no new row".to_string()))?;
                heap.mark_deleted(new_row.id)?;
                heap.clear_deleted(op.row_id)
            }
            OpKind::Delete => heap.clear_deleted(op.row_id),
        }
    }

    fn rebuild_indexes(&self, table_name: &str) -> Result<()> {
        if self.index_manager.by_table(table_name).is_empty() {
            return Ok(());
        }
        let schema = self.catalog.get_table(table_name)?;
        let rows = self.heap_for(table_name)?.read_all(false)?;
        self.index_manager
            .rebuild_table(table_name, &schema.column_names(), &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::storage::{Row, Value};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        pager: Arc<Pager>,
        catalog: Arc<Catalog>,
        indexes: Arc<IndexManager>,
        manager: TransactionManager,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let pager = Arc::new(Pager::open(dir.path().join("test.db")).unwrap());
        let catalog = Arc::new(Catalog::open(dir.path().join("meta.json")).unwrap());
        let indexes = Arc::new(IndexManager::new());

        let first = TableHeap::create(&pager).unwrap();
        catalog
            .create_table(
                "t",
                vec![
                    Column::new("id", DataType::Int),
                    Column::new("name", DataType::Text),
                ],
                first,
            )
            .unwrap();

        let manager = TransactionManager::new(pager.clone(), catalog.clone(), indexes.clone());
        Fixture {
            _dir: dir,
            pager,
            catalog,
            indexes,
            manager,
        }
    }

    fn heap(f: &Fixture) -> TableHeap {
        let schema = f.catalog.get_table("t").unwrap();
        TableHeap::open(f.pager.clone(), schema.first_page_id, 2)
    }

    fn sample_row(id: i64, name: &str) -> Row {
        Row::new(vec![Value::Int(id), Value::Text(name.to_string())])
    }

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let f = setup();
        assert_eq!(f.manager.begin().id, 1);
        assert_eq!(f.manager.begin().id, 2);
        assert_eq!(f.manager.active_list().len(), 2);
    }

    #[test]
    fn test_commit_removes_from_active() {
        let f = setup();
        let tx = f.manager.begin();

        f.manager.commit(tx.id).unwrap();
        assert_eq!(tx.status(), TxStatus::Committed);
        assert!(f.manager.active_list().is_empty());
        assert!(f.manager.is_committed(tx.id));

        // Terminal transactions cannot be committed again.
        assert!(matches!(
            f.manager.commit(tx.id),
            Err(Error::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_active_transaction_is_not_committed() {
        let f = setup();
        let tx = f.manager.begin();
        assert!(!f.manager.is_committed(tx.id));
    }

    #[test]
    fn test_rollback_insert() {
        let f = setup();
        let heap = heap(&f);
        let tx = f.manager.begin();

        let mut row = sample_row(1, "a");
        heap.insert(&mut row).unwrap();
        tx.record(Operation {
            kind: OpKind::Insert,
            table_name: "t".to_string(),
            row_id: row.id,
            old_row: None,
            new_row: Some(row),
        });

        f.manager.rollback(tx.id).unwrap();
        assert_eq!(tx.status(), TxStatus::Aborted);
        assert!(heap.read_all(false).unwrap().is_empty());
    }

    #[test]
    fn test_rollback_delete() {
        let f = setup();
        let heap = heap(&f);

        let mut row = sample_row(1, "a");
        heap.insert(&mut row).unwrap();

        let tx = f.manager.begin();
        heap.mark_deleted(row.id).unwrap();
        tx.record(Operation {
            kind: OpKind::Delete,
            table_name: "t".to_string(),
            row_id: row.id,
            old_row: Some(row.clone()),
            new_row: None,
        });

        f.manager.rollback(tx.id).unwrap();
        let live = heap.read_all(false).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].values[0], Value::Int(1));
    }

    #[test]
    fn test_rollback_update_restores_old_version() {
        let f = setup();
        let heap = heap(&f);

        let mut old_row = sample_row(1, "before");
        heap.insert(&mut old_row).unwrap();

        let tx = f.manager.begin();
        let mut new_row = sample_row(1, "after");
        heap.update(old_row.id, &mut new_row).unwrap();
        tx.record(Operation {
            kind: OpKind::Update,
            table_name: "t".to_string(),
            row_id: old_row.id,
            old_row: Some(old_row.clone()),
            new_row: Some(new_row),
        });

        f.manager.rollback(tx.id).unwrap();
        let live = heap.read_all(false).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].values[1], Value::Text("before".to_string()));
        assert_eq!(live[0].id, old_row.id);
    }

    #[test]
    fn test_rollback_rebuilds_indexes() {
        let f = setup();
        let heap = heap(&f);
        let index = f.indexes.create("ix", "t", "id", DataType::Int).unwrap();

        let tx = f.manager.begin();
        let mut row = sample_row(5, "x");
        heap.insert(&mut row).unwrap();
        index.insert(Value::Int(5), row.id).unwrap();
        tx.record(Operation {
            kind: OpKind::Insert,
            table_name: "t".to_string(),
            row_id: row.id,
            old_row: None,
            new_row: Some(row),
        });

        f.manager.rollback(tx.id).unwrap();
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn test_unknown_transaction() {
        let f = setup();
        assert!(matches!(
            f.manager.rollback(42),
            Err(Error::TransactionNotFound(42))
        ));
        assert!(f.manager.get(42).is_err());
    }
}
