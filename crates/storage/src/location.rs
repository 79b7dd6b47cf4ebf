//! Storage locations
//!
//! A `StorageLocation` describes where a managed document lives in the
//! backing store and how it is accessed: which row, which LOB encoding,
//! whether it may be written, and how to create it when the row is missing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// LOB encoding of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Character LOB holding JSON text
    Character,
    /// Binary LOB holding MessagePack
    Binary,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Character => write!(f, "character"),
            StorageKind::Binary => write!(f, "binary"),
        }
    }
}

/// Identity of a backing row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    /// Table (or collection) name
    pub table: String,
    /// Primary key within the table
    pub key: String,
}

impl RowKey {
    /// Create a row key
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        RowKey {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.key)
    }
}

/// Where and how a managed document is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Backing row
    pub row: RowKey,
    /// LOB encoding
    pub kind: StorageKind,
    /// Read-only locations are never locked, inserted or written
    pub read_only: bool,
    /// Root element name used when a missing row is created
    pub root_name: String,
    /// Identity of the location definition (query family, column set)
    ///
    /// Part of the cache key, so that changing the definition yields a fresh
    /// cache entry instead of a stale one.
    pub definition: String,
}

impl StorageLocation {
    /// Writable character-LOB location
    pub fn new(row: RowKey, root_name: impl Into<String>) -> Self {
        StorageLocation {
            row,
            kind: StorageKind::Character,
            read_only: false,
            root_name: root_name.into(),
            definition: "default".to_string(),
        }
    }

    /// Builder: LOB encoding
    pub fn with_kind(mut self, kind: StorageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder: read-only flag
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builder: definition identity
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    /// Definition-dependent part of the cache key
    pub fn definition_key(&self) -> String {
        format!("{}#{}", self.definition, self.kind)
    }

    /// Composite cache key: definition key, access mode, backing row
    pub fn cache_key(&self) -> String {
        let mode = if self.read_only { "RO" } else { "RW" };
        format!("{}/{}/{}", self.definition_key(), mode, self.row)
    }
}
