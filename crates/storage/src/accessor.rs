//! LOB accessor strategies
//!
//! A `LobAccessor` is chosen for each open of a managed document from the
//! location's [`StorageKind`]. It remembers the locator selected by the last
//! `select_and_lock` and converts between LOB content and document trees:
//!
//! - Character: JSON text of the [`SerialNode`] structure
//! - Binary: MessagePack (named fields) of the same structure
//!
//! The change-version marker is read from the root's attributes without
//! materialising a tree.

use crate::connection::{LockWait, StoreConnection};
use crate::lob::{LobLocator, LobValue};
use crate::location::{StorageKind, StorageLocation};
use serde::Deserialize;
use tracing::debug;
use workdoc_core::{DocumentTree, Error, Result, SerialNode};

/// Root attribute holding the change-version marker
pub const CHANGE_NUMBER_ATTR: &str = "change-number";

/// Root element with only its attributes decoded
#[derive(Deserialize)]
struct RootHeader {
    #[serde(default)]
    attrs: Vec<(String, String)>,
}

impl RootHeader {
    fn change_number(self) -> String {
        self.attrs
            .into_iter()
            .find(|(k, _)| k == CHANGE_NUMBER_ATTR)
            .map(|(_, v)| v)
            .unwrap_or_default()
    }
}

/// Storage strategy for one managed document
#[derive(Debug, Clone)]
pub enum LobAccessor {
    /// Character LOB accessor
    Character {
        /// Locator from the last select
        locator: Option<LobLocator>,
    },
    /// Binary LOB accessor
    Binary {
        /// Locator from the last select
        locator: Option<LobLocator>,
    },
}

impl LobAccessor {
    /// Accessor for the given encoding
    pub fn for_kind(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Character => LobAccessor::Character { locator: None },
            StorageKind::Binary => LobAccessor::Binary { locator: None },
        }
    }

    /// Encoding handled by this accessor
    pub fn kind(&self) -> StorageKind {
        match self {
            LobAccessor::Character { .. } => StorageKind::Character,
            LobAccessor::Binary { .. } => StorageKind::Binary,
        }
    }

    /// Locator selected by the last `select_and_lock`, if any
    pub fn locator(&self) -> Option<&LobLocator> {
        match self {
            LobAccessor::Character { locator } | LobAccessor::Binary { locator } => {
                locator.as_ref()
            }
        }
    }

    fn locator_slot(&mut self) -> &mut Option<LobLocator> {
        match self {
            LobAccessor::Character { locator } | LobAccessor::Binary { locator } => locator,
        }
    }

    /// Select the backing row, locking it unless the location is read-only
    ///
    /// Returns `false` when no row exists.
    pub fn select_and_lock(
        &mut self,
        conn: &mut dyn StoreConnection,
        location: &StorageLocation,
        wait: LockWait,
    ) -> Result<bool> {
        let selected = if location.read_only {
            conn.select_row(location)?
        } else {
            conn.select_and_lock_row(location, wait)?
        };
        let found = selected.is_some();
        *self.locator_slot() = selected;
        Ok(found)
    }

    /// Insert an empty document for `location` and select it
    pub fn insert_empty(
        &mut self,
        conn: &mut dyn StoreConnection,
        location: &StorageLocation,
    ) -> Result<()> {
        let lob = self.empty_lob(&location.root_name)?;
        let locator = conn.insert_row(location, lob)?;
        debug!(target: "workdoc::storage", row = %location.row, "inserted empty document row");
        *self.locator_slot() = Some(locator);
        Ok(())
    }

    /// Change-version marker of the selected row (`""` if absent)
    pub fn read_change_version(&self) -> Result<String> {
        let locator = self.selected()?;
        let header: RootHeader = match (&locator.lob, self.kind()) {
            (LobValue::Character(text), StorageKind::Character) => serde_json::from_str(text)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            (LobValue::Binary(bytes), StorageKind::Binary) => rmp_serde::from_slice(bytes)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            (lob, kind) => return Err(mismatch(kind, lob)),
        };
        Ok(header.change_number())
    }

    /// Materialise the selected row's document
    pub fn read_tree(&self) -> Result<DocumentTree> {
        let locator = self.selected()?;
        match (&locator.lob, self.kind()) {
            (LobValue::Character(text), StorageKind::Character) => DocumentTree::parse_from(text),
            (LobValue::Binary(bytes), StorageKind::Binary) => {
                let serial: SerialNode = rmp_serde::from_slice(bytes)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                DocumentTree::from_serial(&serial)
            }
            (lob, kind) => Err(mismatch(kind, lob)),
        }
    }

    /// Serialise `tree` in this accessor's encoding
    pub fn serialise(&self, tree: &DocumentTree) -> Result<LobValue> {
        let serial = tree.to_serial();
        match self.kind() {
            StorageKind::Character => Ok(LobValue::Character(
                serde_json::to_string(&serial).map_err(|e| Error::Serialization(e.to_string()))?,
            )),
            StorageKind::Binary => Ok(LobValue::Binary(
                rmp_serde::to_vec_named(&serial)
                    .map_err(|e| Error::Serialization(e.to_string()))?,
            )),
        }
    }

    /// Write `tree` back to the selected row
    pub fn write_tree(&mut self, conn: &mut dyn StoreConnection, tree: &DocumentTree) -> Result<()> {
        let lob = self.serialise(tree)?;
        let locator = self.selected()?.clone();
        conn.write_lob(&locator, lob.clone())?;
        debug!(target: "workdoc::storage", row = %locator.row, bytes = lob.len(), "wrote document lob");
        *self.locator_slot() = Some(LobLocator::new(locator.row, lob));
        Ok(())
    }

    /// Serialised form of an empty document with the given root name
    pub fn empty_lob(&self, root_name: &str) -> Result<LobValue> {
        self.serialise(&DocumentTree::create_empty(root_name))
    }

    /// Forget the selected locator
    pub fn release(&mut self) {
        if let Some(locator) = self.locator_slot().take() {
            debug!(target: "workdoc::storage", row = %locator.row, "released lob locator");
        }
    }

    fn selected(&self) -> Result<&LobLocator> {
        self.locator()
            .ok_or_else(|| Error::invalid_state("no row selected by the lob accessor"))
    }
}

fn mismatch(kind: StorageKind, lob: &LobValue) -> Error {
    Error::Storage(format!(
        "{} accessor cannot read a {} lob",
        kind,
        lob.kind()
    ))
}
