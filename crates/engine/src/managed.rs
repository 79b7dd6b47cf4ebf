//! Managed documents (cache entries)
//!
//! A `ManagedDocument` caches the tree stored at one [`StorageLocation`] and
//! keeps it in step with the backing row:
//!
//! ```text
//! Unopened --open--> Open --close--> Closed --open--> Open ...
//!     \               |                 |
//!      +-----------abort (any state)----+--> Aborted
//! ```
//!
//! Each successful `open` hands out an [`OpenDocument`] owned by the
//! caller's transaction. The entry is `Open` while at least one of them is
//! outstanding; read-only entries may be open in many transactions at once.
//!
//! # Change versions
//!
//! Every write stamps a fresh change number on the root element. `open`
//! compares the stored number with the one seen last; only a difference
//! causes a reload, and a reload always installs a brand-new [`TreeRef`].
//! Holders of the previous tree keep a frozen snapshot.
//!
//! # Locking
//!
//! Writers are serialised by the row lock taken by `open` and held until
//! the caller's transaction commits or rolls back. The row is selected
//! before the per-entry mutex is taken, so a transaction waiting for the
//! row never blocks readers of the entry.

use crate::manager::Registry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;
use workdoc_core::{share, Error, Result, TreeRef};
use workdoc_storage::{LobAccessor, LockWait, StorageLocation, StoreConnection, CHANGE_NUMBER_ATTR};

/// Lifecycle state of a managed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// Created, never opened
    Unopened,
    /// Opened by at least one transaction
    Open,
    /// Closed; the tree is frozen until the next open
    Closed,
    /// Aborted; tree and version forgotten
    Aborted,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentState::Unopened => "unopened",
            DocumentState::Open => "open",
            DocumentState::Closed => "closed",
            DocumentState::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

struct EntryState {
    state: DocumentState,
    opens: usize,
    tree: Option<TreeRef>,
    change_version: Option<String>,
}

/// One transaction's use of a managed document
///
/// Returned by [`ManagedDocument::open`] and consumed by
/// [`ManagedDocument::close`]. Holds the selected row and the tree's
/// modification count at open time.
pub struct OpenDocument {
    cache_key: String,
    tree: TreeRef,
    accessor: LobAccessor,
    baseline: u64,
}

impl OpenDocument {
    /// Tree opened by this transaction
    pub fn tree(&self) -> &TreeRef {
        &self.tree
    }

    /// Whether the tree was mutated since `open`
    pub fn is_modified(&self) -> bool {
        self.tree.read().modification_count() != self.baseline
    }
}

impl fmt::Debug for OpenDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDocument")
            .field("cache_key", &self.cache_key)
            .field("baseline", &self.baseline)
            .finish()
    }
}

/// A cached document bound to a storage location
pub struct ManagedDocument {
    location: StorageLocation,
    cache_key: String,
    auto_ids: bool,
    lock_wait: LockWait,
    registry: Weak<Registry>,
    entry: Mutex<EntryState>,
}

impl ManagedDocument {
    /// Create an entry that is not registered with any cache manager
    pub fn new(location: StorageLocation, auto_ids: bool, lock_wait: LockWait) -> Self {
        Self::registered(location, auto_ids, lock_wait, Weak::new())
    }

    pub(crate) fn registered(
        location: StorageLocation,
        auto_ids: bool,
        lock_wait: LockWait,
        registry: Weak<Registry>,
    ) -> Self {
        ManagedDocument {
            cache_key: location.cache_key(),
            location,
            auto_ids,
            lock_wait,
            registry,
            entry: Mutex::new(EntryState {
                state: DocumentState::Unopened,
                opens: 0,
                tree: None,
                change_version: None,
            }),
        }
    }

    /// Storage location of this document
    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Composite cache key
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Current lifecycle state
    pub fn state(&self) -> DocumentState {
        self.entry.lock().state
    }

    /// Number of transactions holding the document open
    pub fn open_count(&self) -> usize {
        self.entry.lock().opens
    }

    /// Cached tree, if one is loaded
    pub fn tree(&self) -> Option<TreeRef> {
        self.entry.lock().tree.clone()
    }

    /// Change version seen at the last open or write
    pub fn change_version(&self) -> Option<String> {
        self.entry.lock().change_version.clone()
    }

    /// Whether the document is open for writing
    pub fn is_writable(&self) -> bool {
        !self.location.read_only && self.state() == DocumentState::Open
    }

    /// Open the document inside the transaction of `conn`
    ///
    /// Locks the backing row (unless read-only), reloads the tree when the
    /// stored change version differs from the cached one, and returns the
    /// transaction's handle on the current tree. Writable documents come
    /// back read-write.
    ///
    /// # Errors
    /// - `RowLockTimeout` if the row is locked by another transaction
    /// - `TooFewRows` if a read-only document has no row
    /// - `TooManyRows` if the location matches several rows
    pub fn open(&self, conn: &mut dyn StoreConnection) -> Result<OpenDocument> {
        let mut accessor = LobAccessor::for_kind(self.location.kind);
        let found = accessor.select_and_lock(conn, &self.location, self.lock_wait)?;
        if !found {
            if self.location.read_only {
                return Err(Error::TooFewRows {
                    key: self.location.row.to_string(),
                });
            }
            accessor.insert_empty(conn, &self.location)?;
        }
        let stored = accessor.read_change_version()?;

        let mut entry = self.entry.lock();
        let current = match (&entry.tree, entry.change_version.as_deref()) {
            (Some(tree), Some(seen)) if seen == stored => {
                debug!(target: "workdoc::cache", key = %self.cache_key, version = %stored, "change version unchanged, keeping cached tree");
                Arc::clone(tree)
            }
            (previous, _) => {
                let loaded = accessor.read_tree()?;
                let next = match previous {
                    Some(prev) if self.auto_ids && !self.location.read_only => {
                        let mut next = prev.read().fork();
                        next.set_read_write(true);
                        next.replace_contents_preserving_ids(&loaded)?;
                        next
                    }
                    _ => loaded,
                };
                info!(target: "workdoc::cache", key = %self.cache_key, version = %stored, "document reloaded");
                let next = share(next);
                entry.tree = Some(Arc::clone(&next));
                entry.change_version = Some(stored);
                next
            }
        };

        let baseline = {
            let mut tree = current.write();
            if self.location.read_only {
                tree.set_read_only();
            } else {
                tree.set_read_write(self.auto_ids);
            }
            tree.modification_count()
        };
        entry.opens += 1;
        entry.state = DocumentState::Open;
        Ok(OpenDocument {
            cache_key: self.cache_key.clone(),
            tree: current,
            accessor,
            baseline,
        })
    }

    /// Close one transaction's use of the document, writing it back if it
    /// was mutated
    ///
    /// A writable tree is frozen whether or not the write succeeds, and a
    /// failed write forgets the change version so the next open reloads
    /// from the store. The entry becomes `Closed` once no transaction holds
    /// it open.
    ///
    /// # Errors
    /// - `InvalidState` if `open` was handed out by a different entry
    pub fn close(&self, open: OpenDocument, conn: &mut dyn StoreConnection) -> Result<()> {
        if open.cache_key != self.cache_key {
            return Err(Error::invalid_state(format!(
                "document {} cannot close a handle of {}",
                self.cache_key, open.cache_key
            )));
        }
        let OpenDocument {
            tree,
            mut accessor,
            baseline,
            ..
        } = open;

        let modified = tree.read().modification_count() != baseline;
        let written = if modified && !self.location.read_only {
            let change = Uuid::new_v4().to_string();
            let result = write_back(&mut accessor, conn, &tree, &change);
            if result.is_ok() {
                debug!(target: "workdoc::cache", key = %self.cache_key, version = %change, "document written");
            }
            Some((change, result))
        } else {
            None
        };
        accessor.release();
        if !self.location.read_only {
            tree.write().set_read_only();
        }

        let mut entry = self.entry.lock();
        let current = entry
            .tree
            .as_ref()
            .map_or(false, |held| Arc::ptr_eq(held, &tree));
        let result = match written {
            Some((change, result)) => {
                if current {
                    entry.change_version = result.as_ref().ok().map(|_| change);
                }
                result
            }
            None => Ok(()),
        };
        entry.opens = entry.opens.saturating_sub(1);
        if entry.opens == 0 && entry.state == DocumentState::Open {
            entry.state = DocumentState::Closed;
        }
        result
    }

    /// Discard the document
    ///
    /// Removes the entry from its cache manager (only if the manager still
    /// holds this very entry), freezes and drops the tree and forgets the
    /// change version. Safe to call in any state, any number of times.
    pub fn abort(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let purged = registry
                .remove_if(&self.cache_key, |_, held| std::ptr::eq(Arc::as_ptr(held), self))
                .is_some();
            if purged {
                debug!(target: "workdoc::cache", key = %self.cache_key, "entry purged");
            }
        }
        let mut entry = self.entry.lock();
        if let Some(tree) = entry.tree.take() {
            tree.write().set_read_only();
        }
        entry.change_version = None;
        entry.opens = 0;
        entry.state = DocumentState::Aborted;
    }
}

fn write_back(
    accessor: &mut LobAccessor,
    conn: &mut dyn StoreConnection,
    tree: &TreeRef,
    change: &str,
) -> Result<()> {
    let mut guard = tree.write();
    let root = guard.root();
    guard.set_attr(root, CHANGE_NUMBER_ATTR, change)?;
    accessor.write_tree(conn, &guard)
}

impl fmt::Debug for ManagedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedDocument")
            .field("cache_key", &self.cache_key)
            .field("state", &self.state())
            .finish()
    }
}
