//! Table-level lock manager
//!
//! Strict two-phase locking at table granularity: any number of readers, or
//! one writer that may also read. A transaction already holding the only
//! read slot may upgrade to the write slot. Waiters block on a condition
//! variable signalled at every release and give up with `LockTimeout` when
//! the deadline passes; deadlocks resolve only through that timeout.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::transaction::TxId;
use crate::error::{Error, Result};

/// Default time a waiter spends on a contended lock before failing
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Lock state of one table.
///
/// Invariant: `writer != 0` implies `readers` is a subset of `{writer}`.
#[derive(Debug, Default)]
struct LockState {
    readers: HashSet<TxId>,
    /// Holder of the exclusive slot, 0 when free
    writer: TxId,
}

#[derive(Debug, Default)]
struct TableLock {
    state: Mutex<LockState>,
    released: Condvar,
}

/// Lock manager over all tables
#[derive(Debug)]
pub struct LockManager {
    tables: Mutex<HashMap<String, Arc<TableLock>>>,
    timeout: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn table_lock(&self, table: &str) -> Arc<TableLock> {
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default().clone()
    }

    /// Acquire a shared lock on `table` for `tx_id`.
    pub fn acquire_read(&self, table: &str, tx_id: TxId) -> Result<()> {
        let lock = self.table_lock(table);
        let deadline = Instant::now() + self.timeout;
        let mut state = lock.state.lock().unwrap();

        loop {
            if state.writer == 0 || state.writer == tx_id {
                state.readers.insert(tx_id);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LockTimeout {
                    table: table.to_string(),
                    mode: "read",
                });
            }
            let (next, _) = lock
                .released
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
        }
    }

    /// Acquire the exclusive lock on `table` for `tx_id`.
    ///
    /// Granted when the exclusive slot is free or already ours and no other
    /// transaction holds a read slot; holding our own read slot upgrades.
    pub fn acquire_write(&self, table: &str, tx_id: TxId) -> Result<()> {
        let lock = self.table_lock(table);
        let deadline = Instant::now() + self.timeout;
        let mut state = lock.state.lock().unwrap();

        loop {
            let writer_free = state.writer == 0 || state.writer == tx_id;
            let no_other_readers = state.readers.iter().all(|r| *r == tx_id);
            if writer_free && no_other_readers {
                state.writer = tx_id;
                state.readers.insert(tx_id);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LockTimeout {
                    table: table.to_string(),
                    mode: "write",
                });
            }
            let (next, _) = lock
                .released
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
        }
    }

    /// Release every lock held by `tx_id`.
    pub fn release_all(&self, tx_id: TxId) {
        let locks: Vec<Arc<TableLock>> = self.tables.lock().unwrap().values().cloned().collect();
        for lock in locks {
            let mut state = lock.state.lock().unwrap();
            state.readers.remove(&tx_id);
            if state.writer == tx_id {
                state.writer = 0;
            }
            drop(state);
            lock.released.notify_all();
        }
    }

    /// Release `tx_id`'s locks on one table.
    pub fn release(&self, table: &str, tx_id: TxId) {
        let lock = match self.tables.lock().unwrap().get(table) {
            Some(lock) => lock.clone(),
            None => return,
        };

        let mut state = lock.state.lock().unwrap();
        state.readers.remove(&tx_id);
        if state.writer == tx_id {
            state.writer = 0;
        }
        drop(state);
        lock.released.notify_all();
    }
}
