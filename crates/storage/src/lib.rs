//! Storage layer for WorkDoc
//!
//! This crate implements the backing-store side of managed documents:
//! - StorageLocation / RowKey: where a document lives and how it is keyed
//! - StoreConnection: transactional row access with row locks
//! - LobAccessor: character (JSON) and binary (MessagePack) LOB strategies
//! - MemoryStore: in-memory row store with per-row locks and buffered writes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod connection;
pub mod lob;
pub mod location;
pub mod memory;

pub use accessor::{LobAccessor, CHANGE_NUMBER_ATTR};
pub use connection::{shared, LockWait, SharedConnection, StoreConnection};
pub use lob::{LobLocator, LobValue};
pub use location::{RowKey, StorageKind, StorageLocation};
pub use memory::{MemoryConnection, MemoryStore};
