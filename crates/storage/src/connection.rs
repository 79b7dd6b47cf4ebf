//! Backing-store connection contract
//!
//! A `StoreConnection` is one transaction against the backing store. Row
//! locks taken by `select_and_lock_row` or `insert_row` are held until
//! `commit` or `rollback` ends the transaction.

use crate::lob::{LobLocator, LobValue};
use crate::location::StorageLocation;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use workdoc_core::Result;

/// Connection shared between the request and its document providers
pub type SharedConnection = Arc<Mutex<Box<dyn StoreConnection>>>;

/// Wrap a connection for sharing
pub fn shared(conn: impl StoreConnection + 'static) -> SharedConnection {
    Arc::new(Mutex::new(Box::new(conn)))
}

/// How long to wait for a contended row lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    /// Fail immediately if the row is locked elsewhere
    #[default]
    NoWait,
    /// Wait up to the given duration
    Wait(Duration),
    /// Wait until the lock is released
    Forever,
}

/// Transactional access to document rows
pub trait StoreConnection: Send {
    /// Select the row at `location` and lock it for this transaction
    ///
    /// Returns `None` when no row exists.
    ///
    /// # Errors
    /// - `RowLockTimeout` if the row stays locked by another transaction
    /// - `TooManyRows` if more than one row matches
    fn select_and_lock_row(
        &mut self,
        location: &StorageLocation,
        wait: LockWait,
    ) -> Result<Option<LobLocator>>;

    /// Select the row at `location` without locking it
    fn select_row(&mut self, location: &StorageLocation) -> Result<Option<LobLocator>>;

    /// Insert a new row holding `lob`; the row is locked by this transaction
    fn insert_row(&mut self, location: &StorageLocation, lob: LobValue) -> Result<LobLocator>;

    /// Overwrite the LOB of a row locked by this transaction
    fn write_lob(&mut self, locator: &LobLocator, lob: LobValue) -> Result<()>;

    /// Make this transaction's writes durable and release its locks
    fn commit(&mut self) -> Result<()>;

    /// Discard this transaction's writes and release its locks
    fn rollback(&mut self) -> Result<()>;
}
