//! Execution engine for SiltDB
//!
//! The engine wires the catalog, pager, index registry and transaction
//! manager together and dispatches parsed statement intents. Results are
//! returned as display-ready strings, one statement at a time.

use std::path::Path;
use std::sync::Arc;

use crate::catalog::{Catalog, Column, DataType, TableSchema};
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::sql;
use crate::sql::ast::*;
use crate::storage::{Pager, TableHeap, Value};
use crate::transaction::{Transaction, TransactionManager, TxId, AUTO_COMMIT_TX};

/// The engine façade: statement dispatch over the storage, index and
/// transaction subsystems
pub struct Engine {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) pager: Arc<Pager>,
    pub(crate) indexes: Arc<IndexManager>,
    pub(crate) tx_manager: Arc<TransactionManager>,
    /// The explicit transaction opened by BEGIN, if any
    pub(crate) current_tx: Option<Arc<Transaction>>,
}

impl Engine {
    /// Open the database file and its catalog sidecar, rebuilding every
    /// persisted index from its table heap.
    pub fn open(db_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> Result<Self> {
        let pager = Arc::new(Pager::open(db_path)?);
        let catalog = Arc::new(Catalog::open(meta_path)?);
        let indexes = Arc::new(IndexManager::new());

        rebuild_indexes(&catalog, &indexes, &pager)?;

        let tx_manager = Arc::new(TransactionManager::new(
            pager.clone(),
            catalog.clone(),
            indexes.clone(),
        ));

        Ok(Self {
            catalog,
            pager,
            indexes,
            tx_manager,
            current_tx: None,
        })
    }

    /// Open another session over the same database instance.
    ///
    /// Sessions share the catalog, pager, indexes and lock state, so their
    /// statements contend on table locks the way concurrent clients do;
    /// each session carries its own BEGIN state.
    pub fn new_session(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            pager: self.pager.clone(),
            indexes: self.indexes.clone(),
            tx_manager: self.tx_manager.clone(),
            current_tx: None,
        }
    }

    /// Parse and execute one SQL statement.
    pub fn execute_sql(&mut self, input: &str) -> Result<String> {
        let statement = sql::parse(input)?;
        self.execute(statement)
    }

    /// Execute a parsed statement intent.
    pub fn execute(&mut self, statement: Statement) -> Result<String> {
        match statement {
            Statement::CreateTable(stmt) => self.execute_create_table(stmt),
            Statement::DropTable(stmt) => self.execute_drop_table(stmt),
            Statement::CreateIndex(stmt) => self.execute_create_index(stmt),
            Statement::DropIndex(stmt) => self.execute_drop_index(stmt),
            Statement::Insert(stmt) => self.execute_insert(stmt),
            Statement::Select(stmt) => self.execute_select(stmt),
            Statement::Update(stmt) => self.execute_update(stmt),
            Statement::Delete(stmt) => self.execute_delete(stmt),
            Statement::Begin => self.execute_begin(),
            Statement::Commit => self.execute_commit(),
            Statement::Rollback => self.execute_rollback(),
        }
    }

    /// Flush everything to disk; the prompt calls this on shutdown.
    pub fn close(&self) -> Result<()> {
        self.pager.close()
    }

    // ========== DDL ==========

    fn execute_create_table(&mut self, stmt: CreateTableStatement) -> Result<String> {
        // Resolve the column types before touching storage, so a bad type
        // string leaves no half-created table behind.
        let mut columns = Vec::with_capacity(stmt.columns.len());
        for def in &stmt.columns {
            columns.push(Column::new(&def.name, DataType::parse(&def.type_name)?));
        }

        if self.catalog.get_table(&stmt.table_name).is_ok() {
            return Err(Error::TableAlreadyExists(stmt.table_name));
        }

        let first_page_id = TableHeap::create(&self.pager)?;
        self.catalog
            .create_table(&stmt.table_name, columns, first_page_id)?;

        Ok(format!("Table '{}' created successfully", stmt.table_name))
    }

    fn execute_drop_table(&mut self, stmt: DropTableStatement) -> Result<String> {
        // Remove the in-memory indexes before the definitions go away.
        // Heap pages are not reclaimed.
        for index in self.indexes.by_table(&stmt.table_name) {
            IndexManager::drop(&self.indexes, &index.name)?;
        }
        self.catalog.drop_table(&stmt.table_name)?;

        Ok(format!("Table '{}' dropped successfully", stmt.table_name))
    }

    fn execute_create_index(&mut self, stmt: CreateIndexStatement) -> Result<String> {
        let info = self
            .catalog
            .create_index(&stmt.index_name, &stmt.table_name, &stmt.column_name)?;
        let index = self.indexes.create(
            &info.name,
            &info.table_name,
            &info.column_name,
            info.column_kind,
        )?;

        // Build the index from every live row already in the heap.
        let schema = self.catalog.get_table(&stmt.table_name)?;
        let column_index = schema
            .column_index(&stmt.column_name)
            .ok_or_else(|| Error::ColumnNotFound(stmt.column_name.clone(), schema.name.clone()))?;

        let rows = self.heap(&schema).read_all(false)?;
        for row in &rows {
            index.insert(row.values[column_index].clone(), row.id)?;
        }

        Ok(format!(
            "Index '{}' created successfully on {}({}) with {} entries",
            info.name,
            info.table_name,
            info.column_name,
            rows.len()
        ))
    }

    fn execute_drop_index(&mut self, stmt: DropIndexStatement) -> Result<String> {
        IndexManager::drop(&self.indexes, &stmt.index_name)?;
        self.catalog.drop_index(&stmt.index_name)?;

        Ok(format!("Index '{}' dropped successfully", stmt.index_name))
    }

    // ========== Transaction control ==========

    fn execute_begin(&mut self) -> Result<String> {
        if self.current_tx.is_some() {
            return Err(Error::TransactionInProgress);
        }

        let tx = self.tx_manager.begin();
        let id = tx.id;
        self.current_tx = Some(tx);
        Ok(format!("Transaction {} started", id))
    }

    fn execute_commit(&mut self) -> Result<String> {
        let tx = self.current_tx.take().ok_or(Error::NoActiveTransaction)?;
        self.tx_manager.commit(tx.id)?;
        Ok(format!("Transaction {} committed", tx.id))
    }

    fn execute_rollback(&mut self) -> Result<String> {
        let tx = self.current_tx.take().ok_or(Error::NoActiveTransaction)?;
        self.tx_manager.rollback(tx.id)?;
        Ok(format!("Transaction {} rolled back", tx.id))
    }

    // ========== Shared helpers ==========

    /// The id statements run under: the open transaction's, or the reserved
    /// auto-commit id 0.
    pub(crate) fn current_tx_id(&self) -> TxId {
        self.current_tx
            .as_ref()
            .map(|tx| tx.id)
            .unwrap_or(AUTO_COMMIT_TX)
    }

    pub(crate) fn heap(&self, schema: &TableSchema) -> TableHeap {
        TableHeap::open(
            self.pager.clone(),
            schema.first_page_id,
            schema.columns.len(),
        )
    }

    /// Wind down an auto-commit mutation: release the statement's locks
    /// whatever happened, and flush only on success so the statement's
    /// effects hit disk before the result is reported.
    pub(crate) fn finish_auto_commit(&self, outcome: Result<String>) -> Result<String> {
        if self.current_tx.is_some() {
            return outcome;
        }

        self.tx_manager.lock_manager().release_all(AUTO_COMMIT_TX);
        match outcome {
            Ok(message) => {
                self.pager.flush_all()?;
                Ok(message)
            }
            Err(e) => Err(e),
        }
    }
}

/// Coerce a parsed literal into a column's value kind.
///
/// Integer literals widen into FLOAT columns, string literals parse into
/// DATE columns as `YYYY-MM-DD` and into BOOLEAN columns as
/// 'true'/'false' (case-insensitive); every other cross-kind assignment is
/// a type mismatch.
pub(crate) fn literal_to_value(literal: &Literal, kind: DataType) -> Result<Value> {
    match (literal, kind) {
        (Literal::Integer(v), DataType::Int) => Ok(Value::Int(*v)),
        (Literal::Integer(v), DataType::Float) => Ok(Value::Float(*v as f64)),
        (Literal::Float(v), DataType::Float) => Ok(Value::Float(*v)),
        (Literal::String(s), DataType::Text) => Ok(Value::Text(s.clone())),
        (Literal::String(s), DataType::Date) => Value::date_from_str(s),
        (Literal::String(s), DataType::Boolean) => match s.to_lowercase().as_str() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(Error::InvalidBoolean(s.clone())),
        },
        (Literal::Boolean(b), DataType::Boolean) => Ok(Value::Boolean(*b)),
        (literal, kind) => Err(Error::TypeMismatch {
            expected: kind.to_string(),
            found: literal_kind(literal).to_string(),
        }),
    }
}

fn literal_kind(literal: &Literal) -> &'static str {
    match literal {
        Literal::Integer(_) => "INT",
        Literal::Float(_) => "FLOAT",
        Literal::String(_) => "TEXT",
        Literal::Boolean(_) => "BOOLEAN",
    }
}

/// Recreate every persisted index by scanning its table's heap.
fn rebuild_indexes(
    catalog: &Arc<Catalog>,
    indexes: &Arc<IndexManager>,
    pager: &Arc<Pager>,
) -> Result<()> {
    for name in catalog.list_indexes() {
        let info = catalog.get_index(&name)?;
        let index = indexes.create(
            &info.name,
            &info.table_name,
            &info.column_name,
            info.column_kind,
        )?;

        let schema = catalog.get_table(&info.table_name)?;
        let column_index = schema
            .column_index(&info.column_name)
            .ok_or_else(|| Error::ColumnNotFound(info.column_name.clone(), schema.name.clone()))?;

        let heap = TableHeap::open(pager.clone(), schema.first_page_id, schema.columns.len());
        let rows = heap.read_all(false)?;
        for row in &rows {
            index.insert(row.values[column_index].clone(), row.id)?;
        }

        tracing::info!(index = %info.name, entries = rows.len(), "rebuilt index");
    }
    Ok(())
}
