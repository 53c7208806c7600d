//! Error types for SiltDB
//!
//! This module defines all error types used throughout the database engine.

use thiserror::Error;

/// The main error type for SiltDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Lexer error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Lexer error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Lexer error: invalid number format at position {0}")]
    InvalidNumber(usize),

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Catalog error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Catalog error: index '{0}' not found")]
    IndexNotFound(String),

    #[error("Catalog error: index '{0}' already exists")]
    IndexAlreadyExists(String),

    #[error("Catalog error: unsupported data type '{0}'")]
    UnsupportedDataType(String),

    #[error("Catalog error: failed to encode or decode metadata: {0}")]
    CatalogEncoding(String),

    // ========== Type Errors ==========
    #[error("Type error: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Type error: invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Type error: invalid boolean '{0}'")]
    InvalidBoolean(String),

    // ========== Storage Errors ==========
    #[error("Storage error: page {0} is full")]
    PageFull(u32),

    #[error("Storage error: row of {new_len} bytes does not fit in place of {old_len} bytes")]
    InPlaceTooLarge { old_len: usize, new_len: usize },

    #[error("Storage error: corrupted page {0}")]
    CorruptedPage(u32),

    #[error("Storage error: page {0} out of range")]
    PageOutOfRange(u32),

    #[error("Storage error: incomplete page read")]
    ShortRead,

    #[error("Storage error: invalid UTF-8 in text value")]
    InvalidUtf8,

    #[error("Storage error: row index {0} out of range on page {1}")]
    RowIndexOutOfRange(u16, u32),

    #[error("Storage error: column count mismatch, expected {expected}, got {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    // ========== Execution Errors ==========
    #[error("Execution error: {0}")]
    ExecutionError(String),

    // ========== Transaction Errors ==========
    #[error("Transaction error: transaction {0} not found")]
    TransactionNotFound(u64),

    #[error("Transaction error: transaction already in progress")]
    TransactionInProgress,

    #[error("Transaction error: no active transaction")]
    NoActiveTransaction,

    #[error("Lock error: timed out acquiring {mode} lock on table '{table}'")]
    LockTimeout { table: String, mode: &'static str },

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for SiltDB operations
pub type Result<T> = std::result::Result<T, Error>;
