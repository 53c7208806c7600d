//! Mutating statements: INSERT, UPDATE, DELETE
//!
//! Every mutation takes the table's exclusive lock, applies its heap
//! change, mirrors it into the covering indexes and appends a reversible
//! operation to the open transaction's log. Auto-commit statements release
//! their locks and flush at the end instead.

use super::engine::{literal_to_value, Engine};
use crate::error::{Error, Result};
use crate::sql::ast::*;
use crate::storage::{Row, Value};
use crate::transaction::{OpKind, Operation};

impl Engine {
    pub(crate) fn execute_insert(&mut self, stmt: InsertStatement) -> Result<String> {
        let schema = self.catalog.get_table(&stmt.table_name)?;
        self.tx_manager
            .lock_manager()
            .acquire_write(&stmt.table_name, self.current_tx_id())?;

        let outcome = self.insert_rows(&stmt, &schema);
        self.finish_auto_commit(outcome.map(|n| format!("{} row(s) inserted", n)))
    }

    fn insert_rows(
        &self,
        stmt: &InsertStatement,
        schema: &crate::catalog::TableSchema,
    ) -> Result<usize> {
        let heap = self.heap(schema);
        let column_names = schema.column_names();
        let tx_id = self.current_tx_id();

        let mut inserted = 0;
        for literals in &stmt.rows {
            if literals.len() != schema.columns.len() {
                return Err(Error::ColumnCountMismatch {
                    expected: schema.columns.len(),
                    found: literals.len(),
                });
            }

            let mut values = Vec::with_capacity(literals.len());
            for (literal, column) in literals.iter().zip(&schema.columns) {
                values.push(literal_to_value(literal, column.kind)?);
            }

            let mut row = Row::new(values);
            row.tx_id = tx_id;
            heap.insert(&mut row)?;
            self.indexes
                .on_insert(&stmt.table_name, &row, &column_names)?;

            if let Some(tx) = &self.current_tx {
                tx.record(Operation {
                    kind: OpKind::Insert,
                    table_name: stmt.table_name.clone(),
                    row_id: row.id,
                    old_row: None,
                    new_row: Some(row),
                });
            }

            inserted += 1;
        }

        Ok(inserted)
    }

    pub(crate) fn execute_update(&mut self, stmt: UpdateStatement) -> Result<String> {
        let schema = self.catalog.get_table(&stmt.table_name)?;
        self.tx_manager
            .lock_manager()
            .acquire_write(&stmt.table_name, self.current_tx_id())?;

        let outcome = self.update_rows(&stmt, &schema);
        self.finish_auto_commit(outcome.map(|n| format!("{} row(s) updated", n)))
    }

    fn update_rows(
        &self,
        stmt: &UpdateStatement,
        schema: &crate::catalog::TableSchema,
    ) -> Result<usize> {
        let heap = self.heap(schema);
        let column_names = schema.column_names();
        let tx_id = self.current_tx_id();

        // Resolve the SET clause once, against the schema.
        let mut assignments: Vec<(usize, Value)> = Vec::with_capacity(stmt.assignments.len());
        for assignment in &stmt.assignments {
            let index = schema.column_index(&assignment.column).ok_or_else(|| {
                Error::ColumnNotFound(assignment.column.clone(), schema.name.clone())
            })?;
            let value = literal_to_value(&assignment.value, schema.columns[index].kind)?;
            assignments.push((index, value));
        }

        let mut updated = 0;
        for old_row in heap.read_all(false)? {
            if !self.matches(&old_row, stmt.where_clause.as_ref(), schema)? {
                continue;
            }

            self.indexes
                .on_delete(&stmt.table_name, &old_row, &column_names);

            let mut new_row = Row::new(old_row.values.clone());
            new_row.tx_id = tx_id;
            for (index, value) in &assignments {
                new_row.values[*index] = value.clone();
            }

            heap.update(old_row.id, &mut new_row)?;
            self.indexes
                .on_insert(&stmt.table_name, &new_row, &column_names)?;

            if let Some(tx) = &self.current_tx {
                tx.record(Operation {
                    kind: OpKind::Update,
                    table_name: stmt.table_name.clone(),
                    row_id: old_row.id,
                    old_row: Some(old_row),
                    new_row: Some(new_row),
                });
            }

            updated += 1;
        }

        Ok(updated)
    }

    pub(crate) fn execute_delete(&mut self, stmt: DeleteStatement) -> Result<String> {
        let schema = self.catalog.get_table(&stmt.table_name)?;
        self.tx_manager
            .lock_manager()
            .acquire_write(&stmt.table_name, self.current_tx_id())?;

        let outcome = self.delete_rows(&stmt, &schema);
        self.finish_auto_commit(outcome.map(|n| format!("{} row(s) deleted", n)))
    }

    fn delete_rows(
        &self,
        stmt: &DeleteStatement,
        schema: &crate::catalog::TableSchema,
    ) -> Result<usize> {
        let heap = self.heap(schema);
        let column_names = schema.column_names();

        let mut deleted = 0;
        for row in heap.read_all(false)? {
            if !self.matches(&row, stmt.where_clause.as_ref(), schema)? {
                continue;
            }

            self.indexes.on_delete(&stmt.table_name, &row, &column_names);
            heap.mark_deleted(row.id)?;

            if let Some(tx) = &self.current_tx {
                tx.record(Operation {
                    kind: OpKind::Delete,
                    table_name: stmt.table_name.clone(),
                    row_id: row.id,
                    old_row: Some(row),
                    new_row: None,
                });
            }

            deleted += 1;
        }

        Ok(deleted)
    }
}
