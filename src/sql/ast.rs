//! SQL abstract syntax tree
//!
//! The AST is exactly the set of statement intents the engine consumes;
//! there is no separate planning layer between the parser and execution.

/// A parsed SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Begin,
    Commit,
    Rollback,
}

/// CREATE TABLE name (col TYPE, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    /// Column names with their raw type spellings, resolved by the engine
    pub columns: Vec<ColumnDef>,
}

/// A column definition as written
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
}

/// DROP TABLE name
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub table_name: String,
}

/// CREATE INDEX name ON table (column)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
}

/// DROP INDEX name
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub index_name: String,
}

/// INSERT INTO table VALUES (...), (...)
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    pub rows: Vec<Vec<Literal>>,
}

/// SELECT columns FROM table [WHERE expr]
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub projection: Projection,
    pub table_name: String,
    pub where_clause: Option<Expr>,
}

/// The select list
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// SELECT *
    All,
    /// Named columns, in the order written
    Columns(Vec<String>),
}

/// UPDATE table SET col = lit, ... [WHERE expr]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
}

/// One SET clause entry
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Literal,
}

/// DELETE FROM table [WHERE expr]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<Expr>,
}

/// A literal value as written in the statement
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

/// A WHERE clause: a boolean tree over comparisons
///
/// The left side of every comparison is a column reference and the right
/// side a literal, which is what makes index selection a syntactic check.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Comparison {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}
