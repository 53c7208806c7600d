//! SiltDB - A small disk-backed relational database engine
//!
//! This library provides the core components of the database:
//! - Paged heap storage with tombstone-based deletes
//! - In-memory B-Tree secondary indexes, rebuilt from the heap at startup
//! - A durable catalog persisted to a JSON sidecar file
//! - Table-level two-phase locking with timeout
//! - Transactions with atomic commit and operation-log rollback
//! - A SQL front-end (lexer, parser, AST) and execution engine

pub mod catalog;
pub mod error;
pub mod executor;
pub mod index;
pub mod sql;
pub mod storage;
pub mod transaction;

pub use error::{Error, Result};
pub use executor::Engine;
