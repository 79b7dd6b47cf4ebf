//! In-memory row store with row locks
//!
//! `MemoryStore` stands in for the relational backing store. Each row holds
//! committed LOB values and an optional lock owner. Connections buffer their
//! writes and apply them on `commit`; `rollback` discards them and removes
//! rows the transaction inserted.
//!
//! ## Locking
//!
//! A row lock belongs to one transaction (connection) and is re-entrant for
//! it. Contending connections wait on a shared `Condvar` according to their
//! [`LockWait`]; locks are released on commit, rollback and drop.

use crate::connection::{LockWait, StoreConnection};
use crate::lob::{LobLocator, LobValue};
use crate::location::{RowKey, StorageLocation};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};
use workdoc_core::{Error, Result};

#[derive(Debug, Default)]
struct Row {
    committed: Vec<LobValue>,
    owner: Option<u64>,
}

#[derive(Debug, Default)]
struct StoreInner {
    rows: Mutex<HashMap<RowKey, Row>>,
    released: Condvar,
    next_txn: AtomicU64,
    commits: AtomicU64,
    lob_writes: AtomicU64,
}

/// Shared in-memory backing store
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new transaction
    pub fn connect(&self) -> MemoryConnection {
        let txn = self.inner.next_txn.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(target: "workdoc::storage", txn, "connection opened");
        MemoryConnection {
            store: self.clone(),
            txn,
            pending: HashMap::new(),
            locked: HashSet::new(),
            inserted: HashSet::new(),
        }
    }

    /// Store a committed LOB for `row`, replacing any existing rows
    pub fn put_committed(&self, row: RowKey, lob: LobValue) {
        let mut rows = self.inner.rows.lock();
        rows.entry(row).or_default().committed = vec![lob];
    }

    /// Add another committed row under the same key (duplicate key data)
    pub fn push_duplicate(&self, row: RowKey, lob: LobValue) {
        let mut rows = self.inner.rows.lock();
        rows.entry(row).or_default().committed.push(lob);
    }

    /// Committed LOB of `row`, if exactly one exists
    pub fn committed(&self, row: &RowKey) -> Option<LobValue> {
        let rows = self.inner.rows.lock();
        match rows.get(row).map(|r| r.committed.as_slice()) {
            Some([lob]) => Some(lob.clone()),
            _ => None,
        }
    }

    /// Whether `row` is currently locked by some transaction
    pub fn is_locked(&self, row: &RowKey) -> bool {
        self.inner
            .rows
            .lock()
            .get(row)
            .map_or(false, |r| r.owner.is_some())
    }

    /// Number of committed transactions
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }

    /// Number of LOB writes applied by commits
    pub fn lob_write_count(&self) -> u64 {
        self.inner.lob_writes.load(Ordering::Relaxed)
    }

    fn release_all(&self, txn: u64, keys: impl IntoIterator<Item = RowKey>) {
        let mut rows = self.inner.rows.lock();
        for key in keys {
            if let Some(row) = rows.get_mut(&key) {
                if row.owner == Some(txn) {
                    row.owner = None;
                }
            }
        }
        drop(rows);
        self.inner.released.notify_all();
    }
}

/// One transaction against a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    txn: u64,
    pending: HashMap<RowKey, LobValue>,
    locked: HashSet<RowKey>,
    inserted: HashSet<RowKey>,
}

impl MemoryConnection {
    /// Wait until `key` is unlocked (or locked by us), then take the lock
    fn acquire<'a>(
        &self,
        mut rows: MutexGuard<'a, HashMap<RowKey, Row>>,
        key: &RowKey,
        wait: LockWait,
    ) -> Result<MutexGuard<'a, HashMap<RowKey, Row>>> {
        let deadline = match wait {
            LockWait::Wait(d) => Some(Instant::now() + d),
            _ => None,
        };
        loop {
            let owner = match rows.get(key) {
                Some(row) => row.owner,
                None => return Ok(rows),
            };
            match owner {
                None => {
                    if let Some(row) = rows.get_mut(key) {
                        row.owner = Some(self.txn);
                    }
                    return Ok(rows);
                }
                Some(o) if o == self.txn => return Ok(rows),
                Some(o) => {
                    trace!(target: "workdoc::storage", row = %key, holder = o, txn = self.txn, "row lock contended");
                    match (wait, deadline) {
                        (LockWait::NoWait, _) => return Err(timeout(key)),
                        (LockWait::Forever, _) => self.store.inner.released.wait(&mut rows),
                        (LockWait::Wait(_), Some(deadline)) => {
                            if self
                                .store
                                .inner
                                .released
                                .wait_until(&mut rows, deadline)
                                .timed_out()
                            {
                                let still_held = rows
                                    .get(key)
                                    .and_then(|r| r.owner)
                                    .map_or(false, |o| o != self.txn);
                                if still_held {
                                    return Err(timeout(key));
                                }
                            }
                        }
                        (LockWait::Wait(_), None) => return Err(timeout(key)),
                    }
                }
            }
        }
    }

    fn visible(&self, key: &RowKey, committed: &[LobValue]) -> Result<Option<LobLocator>> {
        if let Some(lob) = self.pending.get(key) {
            return Ok(Some(LobLocator::new(key.clone(), lob.clone())));
        }
        match committed {
            [] => Ok(None),
            [lob] => Ok(Some(LobLocator::new(key.clone(), lob.clone()))),
            many => Err(Error::TooManyRows {
                key: key.to_string(),
                count: many.len(),
            }),
        }
    }

    fn finish(&mut self) {
        let keys: Vec<RowKey> = self.locked.drain().collect();
        self.store.release_all(self.txn, keys);
        self.pending.clear();
        self.inserted.clear();
    }
}

impl StoreConnection for MemoryConnection {
    fn select_and_lock_row(
        &mut self,
        location: &StorageLocation,
        wait: LockWait,
    ) -> Result<Option<LobLocator>> {
        let key = &location.row;
        let rows = self.store.inner.rows.lock();
        let rows = self.acquire(rows, key, wait)?;
        let committed = rows.get(key).map(|r| r.committed.clone());
        drop(rows);

        let Some(committed) = committed else {
            return Ok(None);
        };
        self.locked.insert(key.clone());
        self.visible(key, &committed)
    }

    fn select_row(&mut self, location: &StorageLocation) -> Result<Option<LobLocator>> {
        let key = &location.row;
        let committed = {
            let rows = self.store.inner.rows.lock();
            rows.get(key).map(|r| r.committed.clone()).unwrap_or_default()
        };
        self.visible(key, &committed)
    }

    fn insert_row(&mut self, location: &StorageLocation, lob: LobValue) -> Result<LobLocator> {
        let key = location.row.clone();
        {
            let mut rows = self.store.inner.rows.lock();
            match rows.get(&key) {
                Some(row) if !row.committed.is_empty() || row.owner.is_some() => {
                    return Err(Error::Storage(format!(
                        "unique constraint violated: row {} already exists",
                        key
                    )));
                }
                _ => {}
            }
            rows.insert(
                key.clone(),
                Row {
                    committed: Vec::new(),
                    owner: Some(self.txn),
                },
            );
        }
        debug!(target: "workdoc::storage", row = %key, txn = self.txn, "row inserted");
        self.locked.insert(key.clone());
        self.inserted.insert(key.clone());
        self.pending.insert(key.clone(), lob.clone());
        Ok(LobLocator::new(key, lob))
    }

    fn write_lob(&mut self, locator: &LobLocator, lob: LobValue) -> Result<()> {
        if !self.locked.contains(&locator.row) {
            return Err(Error::Storage(format!(
                "row {} is not locked by this transaction",
                locator.row
            )));
        }
        self.pending.insert(locator.row.clone(), lob);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let writes = self.pending.len() as u64;
        {
            let mut rows = self.store.inner.rows.lock();
            for (key, lob) in self.pending.drain() {
                rows.entry(key).or_default().committed = vec![lob];
            }
        }
        self.store.inner.commits.fetch_add(1, Ordering::Relaxed);
        self.store
            .inner
            .lob_writes
            .fetch_add(writes, Ordering::Relaxed);
        debug!(target: "workdoc::storage", txn = self.txn, writes, "transaction committed");
        self.finish();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        {
            let mut rows = self.store.inner.rows.lock();
            for key in &self.inserted {
                let remove = rows
                    .get(key)
                    .map_or(false, |r| r.committed.is_empty() && r.owner == Some(self.txn));
                if remove {
                    rows.remove(key);
                }
            }
        }
        debug!(target: "workdoc::storage", txn = self.txn, discarded = self.pending.len(), "transaction rolled back");
        self.finish();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.locked.is_empty() || !self.pending.is_empty() {
            let _ = self.rollback();
        }
    }
}

fn timeout(key: &RowKey) -> Error {
    Error::RowLockTimeout {
        key: key.to_string(),
    }
}
