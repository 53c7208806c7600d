//! Transaction module
//!
//! Transaction lifecycle, the table-level lock manager and the operation
//! log that makes rollback possible.

mod lock;
mod manager;
mod transaction;

pub use lock::{LockManager, DEFAULT_LOCK_TIMEOUT};
pub use manager::TransactionManager;
pub use transaction::{OpKind, Operation, Transaction, TxId, TxStatus, AUTO_COMMIT_TX};
