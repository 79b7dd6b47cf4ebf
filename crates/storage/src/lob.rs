//! LOB values and locators

use crate::location::{RowKey, StorageKind};

/// Content of a document column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobValue {
    /// Character LOB (JSON text)
    Character(String),
    /// Binary LOB (MessagePack)
    Binary(Vec<u8>),
}

impl LobValue {
    /// Encoding of this value
    pub fn kind(&self) -> StorageKind {
        match self {
            LobValue::Character(_) => StorageKind::Character,
            LobValue::Binary(_) => StorageKind::Binary,
        }
    }

    /// Size of the stored content in bytes
    pub fn len(&self) -> usize {
        match self {
            LobValue::Character(s) => s.len(),
            LobValue::Binary(b) => b.len(),
        }
    }

    /// Whether the stored content is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A selected row together with the LOB read from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobLocator {
    /// Row the LOB was selected from
    pub row: RowKey,
    /// Column content as of the select
    pub lob: LobValue,
}

impl LobLocator {
    /// Create a locator
    pub fn new(row: RowKey, lob: LobValue) -> Self {
        LobLocator { row, lob }
    }
}
