//! SELECT execution: predicate evaluation, index selection and formatting
//!
//! A WHERE clause that is one bare comparison on an indexed column runs as
//! a point or range lookup through the index; everything else falls back to
//! a full scan with the predicate evaluated per row. Both plans return the
//! same rows, so index selection is purely a matter of work saved.

use std::cmp::Ordering;

use super::engine::{literal_to_value, Engine};
use crate::catalog::TableSchema;
use crate::error::{Error, Result};
use crate::index::RangeOp;
use crate::sql::ast::*;
use crate::storage::{Row, TableHeap};
use crate::transaction::AUTO_COMMIT_TX;

impl Engine {
    pub(crate) fn execute_select(&mut self, stmt: SelectStatement) -> Result<String> {
        let schema = self.catalog.get_table(&stmt.table_name)?;
        self.tx_manager
            .lock_manager()
            .acquire_read(&stmt.table_name, self.current_tx_id())?;

        let outcome = self.run_select(&stmt, &schema);

        // Auto-commit reads hold their lock for the statement only.
        if self.current_tx.is_none() {
            self.tx_manager.lock_manager().release_all(AUTO_COMMIT_TX);
        }
        outcome
    }

    fn run_select(&self, stmt: &SelectStatement, schema: &TableSchema) -> Result<String> {
        let heap = self.heap(schema);

        let rows = match &stmt.where_clause {
            Some(expr) => match self.try_index_scan(&stmt.table_name, expr, schema, &heap)? {
                Some(rows) => rows,
                None => {
                    let mut matched = Vec::new();
                    for row in heap.read_all(false)? {
                        if self.matches(&row, Some(expr), schema)? {
                            matched.push(row);
                        }
                    }
                    matched
                }
            },
            None => heap.read_all(false)?,
        };

        let selected = selected_columns(&stmt.projection, schema)?;
        Ok(format_result(&rows, schema, &selected))
    }

    /// Run the WHERE clause through an index when its shape allows it.
    ///
    /// Returns `None` when no index applies and the caller must scan.
    fn try_index_scan(
        &self,
        table_name: &str,
        expr: &Expr,
        schema: &TableSchema,
        heap: &TableHeap,
    ) -> Result<Option<Vec<Row>>> {
        let (column, op, literal) = match expr {
            Expr::Comparison { column, op, value } => (column, *op, value),
            _ => return Ok(None),
        };

        let index = match self.indexes.by_column(table_name, column) {
            Some(index) => index,
            None => return Ok(None),
        };

        let kind = schema.column_type(column)?;
        let key = literal_to_value(literal, kind)?;

        let row_ids = match op {
            CompareOp::Eq => index.search(&key)?,
            CompareOp::Lt => index.range(RangeOp::Less, &key)?,
            CompareOp::Lte => index.range(RangeOp::LessEq, &key)?,
            CompareOp::Gt => index.range(RangeOp::Greater, &key)?,
            CompareOp::Gte => index.range(RangeOp::GreaterEq, &key)?,
            // Inequality scans the whole table either way.
            CompareOp::Neq => return Ok(None),
        };

        let mut rows = Vec::with_capacity(row_ids.len());
        for row_id in row_ids {
            let row = heap.row(row_id)?;
            if !row.deleted {
                rows.push(row);
            }
        }
        Ok(Some(rows))
    }

    /// Evaluate an optional WHERE clause against one row.
    pub(crate) fn matches(
        &self,
        row: &Row,
        expr: Option<&Expr>,
        schema: &TableSchema,
    ) -> Result<bool> {
        match expr {
            None => Ok(true),
            Some(expr) => evaluate(row, expr, schema),
        }
    }
}

fn evaluate(row: &Row, expr: &Expr, schema: &TableSchema) -> Result<bool> {
    match expr {
        Expr::And(left, right) => {
            Ok(evaluate(row, left, schema)? && evaluate(row, right, schema)?)
        }
        Expr::Or(left, right) => {
            Ok(evaluate(row, left, schema)? || evaluate(row, right, schema)?)
        }
        Expr::Comparison { column, op, value } => {
            let index = schema
                .column_index(column)
                .ok_or_else(|| Error::ColumnNotFound(column.clone(), schema.name.clone()))?;
            let left = &row.values[index];
            let right = literal_to_value(value, schema.columns[index].kind)?;

            let ordering = left.compare(&right)?;
            Ok(match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Neq => ordering != Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Lte => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Gte => ordering != Ordering::Less,
            })
        }
    }
}

/// Resolve the select list to column positions, in the order requested.
fn selected_columns(projection: &Projection, schema: &TableSchema) -> Result<Vec<usize>> {
    match projection {
        Projection::All => Ok((0..schema.columns.len()).collect()),
        Projection::Columns(names) => names
            .iter()
            .map(|name| {
                schema
                    .column_index(name)
                    .ok_or_else(|| Error::ColumnNotFound(name.clone(), schema.name.clone()))
            })
            .collect(),
    }
}

/// Format rows as a tab-separated table with a dashed separator and a
/// `N row(s) returned` trailer.
fn format_result(rows: &[Row], schema: &TableSchema, selected: &[usize]) -> String {
    let mut output = String::new();

    let headers: Vec<&str> = selected
        .iter()
        .map(|&i| schema.columns[i].name.as_str())
        .collect();
    output.push_str(&headers.join("\t"));
    output.push('\n');
    output.push_str(&"-".repeat(headers.len() * 15));
    output.push('\n');

    for row in rows {
        let values: Vec<String> = selected
            .iter()
            .map(|&i| row.values[i].to_string())
            .collect();
        output.push_str(&values.join("\t"));
        output.push('\n');
    }

    output.push_str(&format!("\n{} row(s) returned", rows.len()));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::storage::Value;

    fn schema() -> TableSchema {
        TableSchema {
            name: "t".to_string(),
            columns: vec![
                Column::new("id", DataType::Int),
                Column::new("name", DataType::Text),
            ],
            first_page_id: 0,
        }
    }

    fn row(id: i64, name: &str) -> Row {
        Row::new(vec![Value::Int(id), Value::Text(name.to_string())])
    }

    fn comparison(column: &str, op: CompareOp, value: Literal) -> Expr {
        Expr::Comparison {
            column: column.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_evaluate_comparisons() {
        let schema = schema();
        let r = row(5, "ada");

        let cases = [
            (CompareOp::Eq, 5, true),
            (CompareOp::Neq, 5, false),
            (CompareOp::Lt, 6, true),
            (CompareOp::Lte, 5, true),
            (CompareOp::Gt, 5, false),
            (CompareOp::Gte, 5, true),
        ];
        for (op, value, expected) in cases {
            let expr = comparison("id", op, Literal::Integer(value));
            assert_eq!(evaluate(&r, &expr, &schema).unwrap(), expected);
        }
    }

    #[test]
    fn test_evaluate_boolean_tree() {
        let schema = schema();
        let r = row(5, "ada");

        let both = Expr::And(
            Box::new(comparison("id", CompareOp::Gt, Literal::Integer(1))),
            Box::new(comparison(
                "name",
                CompareOp::Eq,
                Literal::String("ada".to_string()),
            )),
        );
        assert!(evaluate(&r, &both, &schema).unwrap());

        let either = Expr::Or(
            Box::new(comparison("id", CompareOp::Lt, Literal::Integer(0))),
            Box::new(comparison(
                "name",
                CompareOp::Neq,
                Literal::String("bob".to_string()),
            )),
        );
        assert!(evaluate(&r, &either, &schema).unwrap());
    }

    #[test]
    fn test_evaluate_type_mismatch() {
        let schema = schema();
        let expr = comparison("id", CompareOp::Eq, Literal::String("5".to_string()));
        assert!(evaluate(&row(5, "x"), &expr, &schema).is_err());
    }

    #[test]
    fn test_evaluate_unknown_column() {
        let schema = schema();
        let expr = comparison("missing", CompareOp::Eq, Literal::Integer(1));
        assert!(matches!(
            evaluate(&row(1, "x"), &expr, &schema),
            Err(Error::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_selected_columns() {
        let schema = schema();
        assert_eq!(
            selected_columns(&Projection::All, &schema).unwrap(),
            vec![0, 1]
        );
        assert_eq!(
            selected_columns(
                &Projection::Columns(vec!["name".to_string(), "id".to_string()]),
                &schema
            )
            .unwrap(),
            vec![1, 0]
        );
        assert!(selected_columns(
            &Projection::Columns(vec!["nope".to_string()]),
            &schema
        )
        .is_err());
    }

    #[test]
    fn test_format_result() {
        let schema = schema();
        let rows = vec![row(1, "a"), row(2, "b")];
        let output = format_result(&rows, &schema, &[0, 1]);

        let mut lines = output.lines();
        assert_eq!(lines.next().unwrap(), "id\tname");
        assert!(lines.next().unwrap().starts_with("---"));
        assert_eq!(lines.next().unwrap(), "1\ta");
        assert_eq!(lines.next().unwrap(), "2\tb");
        assert!(output.ends_with("2 row(s) returned"));
    }
}
